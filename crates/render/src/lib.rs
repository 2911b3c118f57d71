//! Forward renderer over a [`lumen_gpu::GraphicsDevice`].
//!
//! Each frame the renderer plans its draws from the world, then submits them
//! opaque first and transparent last.
//!
//! # Invariants
//! - The renderer never changes the hierarchy or any transform; the only world
//!   write is the active camera's aspect ratio.
//! - Opaque draws are ordered near to far, transparent draws far to near.
//! - A renderer missing a dependency is skipped, never drawn half-configured.

mod plan;
mod renderer;

pub use plan::{DrawItem, FramePlan, SkipReason, SkippedItem};
pub use renderer::{FrameStats, RenderError, Renderer, RendererSettings};

pub fn crate_info() -> &'static str {
    "lumen-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}

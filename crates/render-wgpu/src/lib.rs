//! wgpu backend for the lumen graphics device.
//!
//! [`WgpuDevice`] implements [`lumen_gpu::GraphicsDevice`] on top of wgpu,
//! emulating the immediate-mode device model with cached render pipelines,
//! a per-frame uniform ring and cached bind groups.
//!
//! # Invariants
//! - Programs are validated by the shared WGSL front end before the device
//!   sees them.
//! - All draws of a frame land in one render pass, in submission order.
//! - A draw whose toggles cull both faces is dropped.

mod device;
mod pipeline;
mod program;
mod target;

pub use device::{SetupError, WgpuDevice, WgpuSettings};
pub use target::RenderTarget;

pub fn crate_info() -> &'static str {
    "lumen-render-wgpu v0.1.0"
}

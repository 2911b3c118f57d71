//! Shared types for the lumen engine.
//!
//! # Invariants
//! - Handle value 0 never names a live GPU resource.
//! - Transforms are plain values; hierarchy lives in the scene graph.

mod handles;
mod types;

pub use handles::{BufferHandle, ProgramHandle, TextureHandle, VertexArrayHandle};
pub use types::Transform;

pub fn crate_info() -> &'static str {
    "lumen-common v0.1.0"
}

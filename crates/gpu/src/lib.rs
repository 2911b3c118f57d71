//! GPU abstraction: the device seam and the resources drawn through it.
//!
//! Shaders reflect their active vertex inputs once at link time; meshes use
//! that table to bind attribute pointers lazily per program; materials pair a
//! shader with a pipeline state and push their own uniforms.
//!
//! # Invariants
//! - A `Shader` value always names a linked program.
//! - A mesh configures attribute pointers at most once per program handle.
//! - A pipeline state is pushed to the device only when its identity differs
//!   from the last one applied through the same cache.

pub mod compile;
mod device;
mod material;
mod mesh;
mod recording;
mod shader;
mod state;
pub mod uniforms;

#[cfg(test)]
mod test_shaders;

pub use device::{
    ActiveAttribute, AttributeType, BaseKind, BufferKind, DeviceError, FilterMode, GraphicsDevice,
    ProgramSource, SamplerDesc, ShaderStage, TextureDesc, UniformValue, VertexAttribute, Viewport,
    WrapMode,
};
pub use material::{Material, MaterialKind, TextureSet, TextureSlot};
pub use mesh::{Mesh, MeshId, MeshStore, Vertex};
pub use recording::{DeviceCommand, RecordingDevice};
pub use shader::{AttributeInfo, Shader, ShaderError};
pub use state::{BlendFactor, ColorMask, CullFace, DepthFunc, PipelineState, StateCache, StateId};

pub fn crate_info() -> &'static str {
    "lumen-gpu v0.1.0"
}

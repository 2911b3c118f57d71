//! Asset side of the engine: named shaders, textures and models, the
//! data-driven material mapping, primitive geometry and the demo scene.
//!
//! The renderer consumes meshes by [`lumen_gpu::MeshId`] and materials by
//! value; nothing here is touched during a frame.
//!
//! # Invariants
//! - Library lookups return `None` and log the name on a miss; they never
//!   fall back to another resource silently.
//! - Replacing a shader or texture never deletes a GPU object a material
//!   may still use; it is retired and deleted once provably unused.
//! - Release the world's materials before [`Assets::release`]. Programs still
//!   held stay pending until [`ShaderLibrary::collect`].

mod descriptor;
mod library;
mod model;
mod primitives;
mod scene;
pub mod shaders;

pub use descriptor::{
    AlphaMode, MaterialDescriptor, MaterialVariant, PipelineStateDescriptor, load_materials,
};
pub use library::{ShaderLibrary, TextureLibrary, checkerboard, decode_png};
pub use model::{Model, ModelLibrary, ModelPart};
pub use primitives::{MeshData, cube, plane, uv_sphere};
pub use scene::{DemoScene, DemoSceneConfig, build_demo_scene};

use lumen_gpu::{DeviceError, GraphicsDevice, ShaderError, TextureDesc};
use lumen_kernel::SceneError;

/// Name of the 1x1 white texture every [`Assets::with_builtins`] provides.
pub const WHITE_TEXTURE: &str = "white";

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("material descriptor error: {0}")]
    Descriptor(#[from] serde_json::Error),
    #[error(transparent)]
    Shader(#[from] ShaderError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// The three libraries an application loads into.
#[derive(Debug, Default)]
pub struct Assets {
    pub shaders: ShaderLibrary,
    pub textures: TextureLibrary,
    pub models: ModelLibrary,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Libraries holding every built-in program and a white texture.
    pub fn with_builtins(device: &mut dyn GraphicsDevice) -> Result<Self, AssetError> {
        let mut assets = Self::new();
        assets.shaders.load_builtins(device)?;
        assets
            .textures
            .insert(device, TextureDesc::solid(WHITE_TEXTURE, [255; 4]))?;
        Ok(assets)
    }

    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.models.release(device);
        self.textures.release(device);
        self.shaders.release(device);
    }
}

pub fn crate_info() -> &'static str {
    "lumen-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_gpu::RecordingDevice;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("assets"));
    }

    #[test]
    fn builtins_and_release() {
        let mut device = RecordingDevice::new();
        let mut assets = Assets::with_builtins(&mut device).unwrap();
        assert_eq!(assets.shaders.len(), shaders::BUILTIN_NAMES.len());
        assert!(assets.textures.get(WHITE_TEXTURE).is_some());
        assets.release(&mut device);
        assert_eq!(device.live_programs(), 0);
        assert_eq!(device.live_textures(), 0);
    }

    #[test]
    fn not_found_names_the_resource() {
        let err = AssetError::NotFound {
            kind: "texture",
            name: "bricks".into(),
        };
        assert_eq!(err.to_string(), "texture not found: bricks");
    }
}

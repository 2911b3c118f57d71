use crate::AssetError;
use crate::shaders;
use lumen_common::TextureHandle;
use lumen_gpu::{GraphicsDevice, ProgramSource, SamplerDesc, Shader, ShaderError, TextureDesc};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Linked shaders by name.
///
/// A replaced or released shader that a material still holds is kept as
/// retired until the last holder lets go; [`ShaderLibrary::collect`] then
/// deletes its program.
#[derive(Debug, Default)]
pub struct ShaderLibrary {
    shaders: BTreeMap<String, Arc<Shader>>,
    retired: Vec<Arc<Shader>>,
}

impl ShaderLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source` and register it under its label, replacing any
    /// shader of the same name.
    pub fn load(
        &mut self,
        device: &mut dyn GraphicsDevice,
        source: &ProgramSource,
    ) -> Result<Arc<Shader>, ShaderError> {
        let shader = Arc::new(Shader::new(device, source)?);
        if let Some(old) = self.shaders.insert(source.label.clone(), shader.clone()) {
            self.retired.push(old);
            self.collect(device);
        }
        Ok(shader)
    }

    /// Compile every built-in program.
    pub fn load_builtins(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), ShaderError> {
        for source in shaders::builtins() {
            self.load(device, &source)?;
        }
        Ok(())
    }

    /// Shared handle to the shader `name`, logging a warning on a miss.
    pub fn get(&self, name: &str) -> Option<Arc<Shader>> {
        let shader = self.shaders.get(name).cloned();
        if shader.is_none() {
            tracing::warn!(shader = name, "shader not found");
        }
        shader
    }

    pub fn contains(&self, name: &str) -> bool {
        self.shaders.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.shaders.keys().map(String::as_str)
    }

    /// Number of registered shaders, not counting retired ones.
    pub fn len(&self) -> usize {
        self.shaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shaders.is_empty()
    }

    /// Retired shaders whose programs are still alive on the device.
    pub fn pending(&self) -> usize {
        self.retired.len()
    }

    /// Delete the programs of retired shaders nothing else holds any more.
    pub fn collect(&mut self, device: &mut dyn GraphicsDevice) {
        for shader in std::mem::take(&mut self.retired) {
            match Arc::try_unwrap(shader) {
                Ok(shader) => shader.release(device),
                Err(shared) => self.retired.push(shared),
            }
        }
    }

    /// Unregister every shader and delete each program no material still
    /// holds. Held programs stay pending until a later [`Self::collect`].
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.retired
            .extend(std::mem::take(&mut self.shaders).into_values());
        self.collect(device);
        if !self.retired.is_empty() {
            tracing::warn!(pending = self.retired.len(), "shaders still referenced; programs kept");
        }
    }
}

/// Device textures by name.
///
/// Handles are plain copies held by materials, so a replaced texture is
/// only retired and stays alive until [`TextureLibrary::release`].
#[derive(Debug, Default)]
pub struct TextureLibrary {
    textures: BTreeMap<String, TextureHandle>,
    retired: Vec<TextureHandle>,
}

impl TextureLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload `desc` under its label. A texture already registered under
    /// that label is retired, not deleted.
    pub fn insert(
        &mut self,
        device: &mut dyn GraphicsDevice,
        desc: TextureDesc,
    ) -> Result<TextureHandle, AssetError> {
        let handle = device.create_texture(&desc)?;
        tracing::debug!(texture = %desc.label, width = desc.width, height = desc.height, "texture uploaded");
        if let Some(old) = self.textures.insert(desc.label, handle) {
            self.retired.push(old);
        }
        Ok(handle)
    }

    /// Decode a PNG file and upload it as `name`.
    pub fn load_png(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        path: impl AsRef<Path>,
        sampler: SamplerDesc,
    ) -> Result<TextureHandle, AssetError> {
        let bytes = std::fs::read(path.as_ref())?;
        let mut desc = decode_png(name, &bytes)?;
        desc.sampler = sampler;
        self.insert(device, desc)
    }

    /// Handle of the texture `name`, logging a warning on a miss.
    pub fn get(&self, name: &str) -> Option<TextureHandle> {
        let texture = self.textures.get(name).copied();
        if texture.is_none() {
            tracing::warn!(texture = name, "texture not found");
        }
        texture
    }

    pub fn contains(&self, name: &str) -> bool {
        self.textures.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.textures.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    /// Replaced textures kept alive for materials that may still use them.
    pub fn pending(&self) -> usize {
        self.retired.len()
    }

    /// Delete every texture, retired ones included. Clear the materials
    /// that use them first.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        let registered = std::mem::take(&mut self.textures).into_values();
        for texture in std::mem::take(&mut self.retired).into_iter().chain(registered) {
            device.delete_texture(texture);
        }
    }
}

/// Decode PNG bytes to RGBA8.
pub fn decode_png(name: &str, bytes: &[u8]) -> Result<TextureDesc, AssetError> {
    let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?.to_rgba8();
    let (width, height) = image.dimensions();
    Ok(TextureDesc::rgba8(name, width, height, image.into_raw()))
}

/// A `size` x `size` checkerboard of `cells` squares per side.
pub fn checkerboard(name: &str, size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> TextureDesc {
    let size = size.max(1);
    let cell = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let color = if (x / cell + y / cell) % 2 == 0 { a } else { b };
            pixels.extend_from_slice(&color);
        }
    }
    TextureDesc::rgba8(name, size, size, pixels)
}

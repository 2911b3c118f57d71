use crate::device::GraphicsDevice;
use crate::shader::Shader;
use crate::state::{PipelineState, StateCache};
use crate::uniforms::{
    SAMPLER_ALBEDO, SAMPLER_EMISSIVE, SAMPLER_NORMAL, SAMPLER_SPECULAR, UNIFORM_TINT,
};
use glam::Vec4;
use lumen_common::TextureHandle;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Texture slots of a textured material. Each slot has a fixed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureSlot {
    Albedo,
    Specular,
    Normal,
    Emissive,
}

impl TextureSlot {
    pub const ALL: [TextureSlot; 4] = [Self::Albedo, Self::Specular, Self::Normal, Self::Emissive];

    pub fn unit(self) -> u32 {
        match self {
            Self::Albedo => 0,
            Self::Specular => 1,
            Self::Normal => 2,
            Self::Emissive => 3,
        }
    }

    /// Sampler uniform that receives this slot's unit.
    pub fn uniform(self) -> &'static str {
        match self {
            Self::Albedo => SAMPLER_ALBEDO,
            Self::Specular => SAMPLER_SPECULAR,
            Self::Normal => SAMPLER_NORMAL,
            Self::Emissive => SAMPLER_EMISSIVE,
        }
    }
}

/// Optional textures, one per [`TextureSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextureSet {
    slots: [Option<TextureHandle>; 4],
}

impl TextureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, slot: TextureSlot, texture: TextureHandle) -> Self {
        self.set(slot, Some(texture));
        self
    }

    pub fn set(&mut self, slot: TextureSlot, texture: Option<TextureHandle>) {
        self.slots[slot.unit() as usize] = texture;
    }

    pub fn get(&self, slot: TextureSlot) -> Option<TextureHandle> {
        self.slots[slot.unit() as usize]
    }

    /// Present textures in unit order.
    pub fn iter(&self) -> impl Iterator<Item = (TextureSlot, TextureHandle)> + '_ {
        TextureSlot::ALL
            .into_iter()
            .filter_map(|slot| self.get(slot).map(|t| (slot, t)))
    }
}

/// Per-variant uniform inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialKind {
    Tinted { tint: Vec4 },
    Textured { textures: TextureSet, tint: Vec4 },
}

impl MaterialKind {
    pub fn tint(&self) -> Vec4 {
        match self {
            Self::Tinted { tint } | Self::Textured { tint, .. } => *tint,
        }
    }
}

/// Shader, pipeline state and the uniforms a draw needs.
#[derive(Debug, Clone)]
pub struct Material {
    name: String,
    shader: Option<Arc<Shader>>,
    state: PipelineState,
    transparent: bool,
    kind: MaterialKind,
}

impl Material {
    pub fn new(name: impl Into<String>, shader: Option<Arc<Shader>>, kind: MaterialKind) -> Self {
        Self {
            name: name.into(),
            shader,
            state: PipelineState::default(),
            transparent: false,
            kind,
        }
    }

    pub fn tinted(name: impl Into<String>, shader: Option<Arc<Shader>>, tint: Vec4) -> Self {
        Self::new(name, shader, MaterialKind::Tinted { tint })
    }

    pub fn textured(
        name: impl Into<String>,
        shader: Option<Arc<Shader>>,
        textures: TextureSet,
    ) -> Self {
        Self::new(
            name,
            shader,
            MaterialKind::Textured {
                textures,
                tint: Vec4::ONE,
            },
        )
    }

    pub fn with_pipeline_state(mut self, state: PipelineState) -> Self {
        self.state = state;
        self
    }

    pub fn with_transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shader(&self) -> Option<&Arc<Shader>> {
        self.shader.as_ref()
    }

    pub fn set_shader(&mut self, shader: Option<Arc<Shader>>) {
        self.shader = shader;
    }

    pub fn pipeline_state(&self) -> &PipelineState {
        &self.state
    }

    pub fn pipeline_state_mut(&mut self) -> &mut PipelineState {
        &mut self.state
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    pub fn set_transparent(&mut self, transparent: bool) {
        self.transparent = transparent;
    }

    pub fn kind(&self) -> &MaterialKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut MaterialKind {
        &mut self.kind
    }

    pub fn set_tint(&mut self, value: Vec4) {
        match &mut self.kind {
            MaterialKind::Tinted { tint } | MaterialKind::Textured { tint, .. } => *tint = value,
        }
    }

    /// Apply the pipeline state, then make the shader current.
    pub fn bind(&self, cache: &mut StateCache, device: &mut dyn GraphicsDevice) {
        self.state.apply(cache, device);
        match &self.shader {
            Some(shader) => shader.bind(device),
            None => tracing::debug!(material = %self.name, "bind without a shader"),
        }
    }

    /// Write the variant's uniforms and texture units. Call after [`Material::bind`].
    pub fn setup(&self, device: &mut dyn GraphicsDevice) {
        let Some(shader) = &self.shader else {
            return;
        };
        match &self.kind {
            MaterialKind::Tinted { tint } => {
                shader.set_vec4(device, UNIFORM_TINT, *tint);
            }
            MaterialKind::Textured { textures, tint } => {
                for (slot, texture) in textures.iter() {
                    device.bind_texture(slot.unit(), texture);
                    shader.set_int(device, slot.uniform(), slot.unit() as i32);
                }
                shader.set_vec4(device, UNIFORM_TINT, *tint);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::UniformValue;
    use crate::recording::{DeviceCommand, RecordingDevice};
    use crate::test_shaders;

    fn shader(device: &mut RecordingDevice) -> Arc<Shader> {
        Arc::new(Shader::new(device, &test_shaders::full_layout()).unwrap())
    }

    #[test]
    fn texture_slots_use_fixed_units() {
        let units: Vec<u32> = TextureSlot::ALL.iter().map(|s| s.unit()).collect();
        assert_eq!(units, vec![0, 1, 2, 3]);
        assert_eq!(TextureSlot::Normal.uniform(), "uNormalMap");
    }

    #[test]
    fn tinted_setup_writes_tint() {
        let mut device = RecordingDevice::new();
        let material = Material::tinted("red", Some(shader(&mut device)), Vec4::new(1.0, 0.0, 0.0, 1.0));
        let mut cache = StateCache::new();
        material.bind(&mut cache, &mut device);
        material.setup(&mut device);

        assert_eq!(
            device.last_uniform("uTint"),
            Some(UniformValue::Vec4(Vec4::new(1.0, 0.0, 0.0, 1.0)))
        );
    }

    #[test]
    fn textured_setup_binds_only_present_slots() {
        let mut device = RecordingDevice::new();
        let textures = TextureSet::new()
            .with(TextureSlot::Albedo, TextureHandle(11))
            .with(TextureSlot::Emissive, TextureHandle(12));
        let material = Material::textured("crate", Some(shader(&mut device)), textures);
        let mut cache = StateCache::new();
        material.bind(&mut cache, &mut device);
        material.setup(&mut device);

        let binds: Vec<(u32, TextureHandle)> = device
            .commands()
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::BindTexture { unit, texture } => Some((*unit, *texture)),
                _ => None,
            })
            .collect();
        assert_eq!(binds, vec![(0, TextureHandle(11)), (3, TextureHandle(12))]);
        assert_eq!(device.last_uniform("uAlbedoMap"), Some(UniformValue::Int(0)));
        assert_eq!(device.last_uniform("uEmissiveMap"), Some(UniformValue::Int(3)));
        assert_eq!(device.last_uniform("uSpecularMap"), None);
        assert_eq!(device.last_uniform("uTint"), Some(UniformValue::Vec4(Vec4::ONE)));
    }

    #[test]
    fn bind_without_shader_only_applies_state() {
        let mut device = RecordingDevice::new();
        let material = Material::tinted("orphan", None, Vec4::ONE);
        let mut cache = StateCache::new();
        material.bind(&mut cache, &mut device);
        material.setup(&mut device);

        assert_eq!(device.state_changes(), 5);
        assert!(
            !device
                .commands()
                .iter()
                .any(|c| matches!(c, DeviceCommand::UseProgram(_)))
        );
    }

    #[test]
    fn set_tint_updates_either_variant() {
        let mut material = Material::textured("t", None, TextureSet::new());
        material.set_tint(Vec4::splat(0.5));
        assert_eq!(material.kind().tint(), Vec4::splat(0.5));
    }
}

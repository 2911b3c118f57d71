use crate::AssetError;
use crate::library::{ShaderLibrary, TextureLibrary};
use crate::shaders;
use glam::Vec4;
use lumen_gpu::{
    BlendFactor, ColorMask, CullFace, DepthFunc, Material, MaterialKind, PipelineState, TextureSet,
    TextureSlot,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which material variant a descriptor builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialVariant {
    #[default]
    Tinted,
    Textured,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaMode {
    #[default]
    Opaque,
    /// Alpha blended, drawn in the transparent pass.
    Blend,
}

/// Serialized form of a [`PipelineState`]. Missing fields take the
/// pipeline defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineStateDescriptor {
    pub face_culling: bool,
    pub cull_face: CullFace,
    pub depth_testing: bool,
    pub depth_func: DepthFunc,
    pub depth_mask: bool,
    pub blending: bool,
    pub blend_src: BlendFactor,
    pub blend_dst: BlendFactor,
    pub color_mask: [bool; 4],
}

impl Default for PipelineStateDescriptor {
    fn default() -> Self {
        Self::from_state(&PipelineState::default())
    }
}

impl PipelineStateDescriptor {
    pub fn from_state(state: &PipelineState) -> Self {
        let (blend_src, blend_dst) = state.blend_factors();
        let mask = state.color_mask();
        Self {
            face_culling: state.face_culling(),
            cull_face: state.cull_face(),
            depth_testing: state.depth_test(),
            depth_func: state.depth_func(),
            depth_mask: state.depth_write(),
            blending: state.blending(),
            blend_src,
            blend_dst,
            color_mask: [mask.r, mask.g, mask.b, mask.a],
        }
    }

    pub fn to_state(&self) -> PipelineState {
        let mut state = PipelineState::new();
        state
            .set_face_culling(self.face_culling)
            .set_cull_face(self.cull_face)
            .set_depth_test(self.depth_testing)
            .set_depth_func(self.depth_func)
            .set_depth_write(self.depth_mask)
            .set_blending(self.blending)
            .set_blend_factors(self.blend_src, self.blend_dst)
            .set_color_mask(ColorMask::from_array(self.color_mask));
        state
    }
}

/// Data-driven description of a [`Material`].
///
/// Shader and textures are referenced by library name and resolved by
/// [`MaterialDescriptor::build`]. An unresolved shader leaves the material
/// without one, which the renderer skips; an unresolved texture leaves its
/// slot empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialDescriptor {
    pub name: String,
    pub kind: MaterialVariant,
    /// Library name; defaults to the built-in program for `kind`.
    pub shader: Option<String>,
    pub tint: [f32; 4],
    pub albedo: Option<String>,
    pub specular: Option<String>,
    pub normal: Option<String>,
    pub emissive: Option<String>,
    pub transparent: bool,
    pub pipeline_state: PipelineStateDescriptor,
    pub alpha_mode: AlphaMode,
    pub double_sided: bool,
}

impl Default for MaterialDescriptor {
    fn default() -> Self {
        Self {
            name: "material".into(),
            kind: MaterialVariant::Tinted,
            shader: None,
            tint: [1.0; 4],
            albedo: None,
            specular: None,
            normal: None,
            emissive: None,
            transparent: false,
            pipeline_state: PipelineStateDescriptor::default(),
            alpha_mode: AlphaMode::Opaque,
            double_sided: false,
        }
    }
}

impl MaterialDescriptor {
    pub fn tinted(name: impl Into<String>, tint: Vec4) -> Self {
        Self {
            name: name.into(),
            tint: tint.to_array(),
            ..Self::default()
        }
    }

    pub fn textured(name: impl Into<String>, albedo: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: MaterialVariant::Textured,
            albedo: Some(albedo.into()),
            ..Self::default()
        }
    }

    pub fn with_shader(mut self, shader: impl Into<String>) -> Self {
        self.shader = Some(shader.into());
        self
    }

    pub fn with_alpha_mode(mut self, mode: AlphaMode) -> Self {
        self.alpha_mode = mode;
        self
    }

    pub fn with_double_sided(mut self, double_sided: bool) -> Self {
        self.double_sided = double_sided;
        self
    }

    pub fn from_json(text: &str) -> Result<Self, AssetError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn shader_name(&self) -> &str {
        match (&self.shader, self.kind) {
            (Some(name), _) => name,
            (None, MaterialVariant::Tinted) => shaders::UNLIT_TINTED,
            (None, MaterialVariant::Textured) => shaders::UNLIT_TEXTURED,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.transparent || self.alpha_mode == AlphaMode::Blend
    }

    /// The explicit pipeline state with alpha mode and sidedness folded in.
    pub fn resolved_pipeline_state(&self) -> PipelineStateDescriptor {
        let mut state = self.pipeline_state;
        if self.alpha_mode == AlphaMode::Blend {
            state.blending = true;
            state.depth_mask = false;
        }
        if self.double_sided {
            state.face_culling = false;
        }
        state
    }

    fn texture_name(&self, slot: TextureSlot) -> Option<&str> {
        match slot {
            TextureSlot::Albedo => self.albedo.as_deref(),
            TextureSlot::Specular => self.specular.as_deref(),
            TextureSlot::Normal => self.normal.as_deref(),
            TextureSlot::Emissive => self.emissive.as_deref(),
        }
    }

    /// Resolve names against the libraries and build the material.
    pub fn build(&self, shaders: &ShaderLibrary, textures: &TextureLibrary) -> Material {
        let shader = shaders.get(self.shader_name());
        let tint = Vec4::from_array(self.tint);
        let kind = match self.kind {
            MaterialVariant::Tinted => MaterialKind::Tinted { tint },
            MaterialVariant::Textured => {
                let mut set = TextureSet::new();
                for slot in TextureSlot::ALL {
                    if let Some(name) = self.texture_name(slot) {
                        set.set(slot, textures.get(name));
                    }
                }
                MaterialKind::Textured {
                    textures: set,
                    tint,
                }
            }
        };
        tracing::debug!(material = %self.name, shader = self.shader_name(), "material built");
        Material::new(self.name.clone(), shader, kind)
            .with_pipeline_state(self.resolved_pipeline_state().to_state())
            .with_transparent(self.is_transparent())
    }
}

/// Read a JSON array of material descriptors.
pub fn load_materials(path: impl AsRef<Path>) -> Result<Vec<MaterialDescriptor>, AssetError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let materials: Vec<MaterialDescriptor> = serde_json::from_str(&text)?;
    tracing::info!(path = %path.as_ref().display(), count = materials.len(), "materials loaded");
    Ok(materials)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_gpu::{RecordingDevice, TextureDesc};
    use std::io::Write;

    fn libraries(device: &mut RecordingDevice) -> (ShaderLibrary, TextureLibrary) {
        let mut shaders = ShaderLibrary::new();
        shaders.load_builtins(device).unwrap();
        let mut textures = TextureLibrary::new();
        textures
            .insert(device, TextureDesc::solid("white", [255; 4]))
            .unwrap();
        (shaders, textures)
    }

    #[test]
    fn default_state_round_trips() {
        let state = PipelineStateDescriptor::default().to_state();
        assert_eq!(state, PipelineState::default());
    }

    #[test]
    fn blend_mode_makes_material_transparent() {
        let desc = MaterialDescriptor::tinted("glass", Vec4::new(1.0, 1.0, 1.0, 0.4))
            .with_alpha_mode(AlphaMode::Blend);
        assert!(desc.is_transparent());
        let state = desc.resolved_pipeline_state();
        assert!(state.blending);
        assert!(!state.depth_mask);
        assert!(state.face_culling);
    }

    #[test]
    fn double_sided_disables_culling() {
        let desc = MaterialDescriptor::default().with_double_sided(true);
        assert!(!desc.resolved_pipeline_state().face_culling);
        assert!(!desc.is_transparent());
    }

    #[test]
    fn partial_json_takes_defaults() {
        let desc = MaterialDescriptor::from_json(
            r#"{ "name": "floor", "kind": "textured", "albedo": "checker",
                 "pipeline_state": { "depth_func": "less_equal" } }"#,
        )
        .unwrap();
        assert_eq!(desc.kind, MaterialVariant::Textured);
        assert_eq!(desc.shader_name(), shaders::UNLIT_TEXTURED);
        assert_eq!(desc.tint, [1.0; 4]);
        assert_eq!(desc.pipeline_state.depth_func, DepthFunc::LessEqual);
        assert!(desc.pipeline_state.depth_testing);
        assert_eq!(desc.alpha_mode, AlphaMode::Opaque);
    }

    #[test]
    fn malformed_json_is_a_descriptor_error() {
        let err = MaterialDescriptor::from_json(r#"{ "kind": "metallic" }"#).unwrap_err();
        assert!(matches!(err, AssetError::Descriptor(_)));
    }

    #[test]
    fn build_resolves_shader_and_textures() {
        let mut device = RecordingDevice::new();
        let (shaders, textures) = libraries(&mut device);
        let mut desc = MaterialDescriptor::textured("crate", "white");
        desc.normal = Some("missing".into());
        let material = desc.build(&shaders, &textures);

        assert_eq!(material.name(), "crate");
        assert_eq!(material.shader().unwrap().label(), shaders::UNLIT_TEXTURED);
        let MaterialKind::Textured { textures: set, .. } = material.kind() else {
            panic!("expected a textured material");
        };
        assert_eq!(set.get(TextureSlot::Albedo), textures.get("white"));
        assert!(set.get(TextureSlot::Normal).is_none());
    }

    #[test]
    fn unknown_shader_builds_without_one() {
        let mut device = RecordingDevice::new();
        let (shaders, textures) = libraries(&mut device);
        let material = MaterialDescriptor::default()
            .with_shader("does_not_exist")
            .build(&shaders, &textures);
        assert!(material.shader().is_none());
    }

    #[test]
    fn build_carries_transparency_into_state() {
        let mut device = RecordingDevice::new();
        let (shaders, textures) = libraries(&mut device);
        let material = MaterialDescriptor::tinted("pane", Vec4::splat(0.5))
            .with_alpha_mode(AlphaMode::Blend)
            .build(&shaders, &textures);
        assert!(material.is_transparent());
        assert!(material.pipeline_state().blending());
        assert!(!material.pipeline_state().depth_write());
        assert_eq!(material.kind().tint(), Vec4::splat(0.5));
    }

    #[test]
    fn load_materials_reads_an_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{ "name": "a" }}, {{ "name": "b", "alpha_mode": "blend", "double_sided": true }}]"#
        )
        .unwrap();
        let materials = load_materials(file.path()).unwrap();
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[1].alpha_mode, AlphaMode::Blend);
        assert!(materials[1].double_sided);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_materials(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, AssetError::Io(_)));
    }
}

use crate::device::{BaseKind, GraphicsDevice, ProgramSource, ShaderStage, UniformValue};
use glam::{Mat4, Vec4};
use lumen_common::ProgramHandle;
use std::collections::HashMap;

/// Errors produced while building a shader program.
#[derive(Debug, thiserror::Error)]
pub enum ShaderError {
    #[error("{stage} stage of '{label}' failed to compile: {log}")]
    Compile {
        label: String,
        stage: ShaderStage,
        log: String,
    },
    #[error("program '{label}' failed to link: {log}")]
    Link { label: String, log: String },
}

/// Reflected metadata for one active vertex input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeInfo {
    pub location: u32,
    /// Scalar components; matrices are flattened (a mat4 is 16).
    pub components: u32,
    pub kind: BaseKind,
}

/// A linked GPU program and its vertex-input reflection table.
///
/// A `Shader` only exists for a program that compiled and linked, so the
/// handle is always usable.
#[derive(Debug)]
pub struct Shader {
    label: String,
    program: ProgramHandle,
    attributes: HashMap<String, AttributeInfo>,
}

impl Shader {
    /// Compile, link and reflect a program on `device`.
    pub fn new(device: &mut dyn GraphicsDevice, source: &ProgramSource) -> Result<Self, ShaderError> {
        let program = match device.create_program(source) {
            Ok(program) => program,
            Err(e) => {
                tracing::error!(shader = %source.label, "{e}");
                return Err(e);
            }
        };

        let mut attributes = HashMap::new();
        for attr in device.active_attributes(program) {
            let Some(location) = attr.location else {
                tracing::debug!(shader = %source.label, attribute = %attr.name, "skipping input without a location");
                continue;
            };
            let (components, kind) = attr.ty.components().unwrap_or_else(|| {
                tracing::warn!(
                    shader = %source.label,
                    attribute = %attr.name,
                    ty = ?attr.ty,
                    "unknown attribute type, assuming one float"
                );
                (1, BaseKind::Float)
            });
            attributes.insert(
                attr.name,
                AttributeInfo {
                    location,
                    components,
                    kind,
                },
            );
        }

        tracing::info!(shader = %source.label, %program, attributes = attributes.len(), "shader ready");
        Ok(Self {
            label: source.label.clone(),
            program,
            attributes,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Reflection entry for `name`; `None` means the program does not read it.
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeInfo)> {
        self.attributes.iter().map(|(name, info)| (name.as_str(), info))
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Make this the current program.
    pub fn bind(&self, device: &mut dyn GraphicsDevice) {
        device.use_program(self.program);
    }

    // Uniform setters write to the current program, so bind first.

    pub fn set_int(&self, device: &mut dyn GraphicsDevice, name: &str, value: i32) {
        device.set_uniform(name, UniformValue::Int(value));
    }

    pub fn set_float(&self, device: &mut dyn GraphicsDevice, name: &str, value: f32) {
        device.set_uniform(name, UniformValue::Float(value));
    }

    pub fn set_vec4(&self, device: &mut dyn GraphicsDevice, name: &str, value: Vec4) {
        device.set_uniform(name, UniformValue::Vec4(value));
    }

    pub fn set_mat4(&self, device: &mut dyn GraphicsDevice, name: &str, value: Mat4) {
        device.set_uniform(name, UniformValue::Mat4(value));
    }

    /// Delete the GPU program.
    pub fn release(self, device: &mut dyn GraphicsDevice) {
        tracing::debug!(shader = %self.label, program = %self.program, "releasing shader");
        device.delete_program(self.program);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::RecordingDevice;
    use crate::test_shaders;

    #[test]
    fn reflection_covers_position_normal_texcoords() {
        let mut device = RecordingDevice::new();
        let shader = Shader::new(&mut device, &test_shaders::full_layout()).unwrap();

        assert_eq!(shader.attribute_count(), 3);
        let position = shader.attribute("aPosition").unwrap();
        let normal = shader.attribute("aNormal").unwrap();
        let uv = shader.attribute("aTexCoords").unwrap();
        assert_eq!(
            (position.components, normal.components, uv.components),
            (3, 3, 2)
        );
        assert!(
            [position, normal, uv]
                .iter()
                .all(|a| a.kind == BaseKind::Float)
        );
        assert_eq!(position.location, 0);
        assert_eq!(uv.location, 2);
    }

    #[test]
    fn missing_attribute_is_absent() {
        let mut device = RecordingDevice::new();
        let shader = Shader::new(&mut device, &test_shaders::position_only()).unwrap();
        assert!(shader.attribute("aNormal").is_none());
        assert!(shader.attribute("aPosition").is_some());
    }

    #[test]
    fn failed_compile_yields_no_shader() {
        let mut device = RecordingDevice::new();
        let source = ProgramSource::new("broken", "not wgsl", test_shaders::FRAGMENT);
        let result = Shader::new(&mut device, &source);
        assert!(matches!(result, Err(ShaderError::Compile { .. })));
        assert_eq!(device.live_programs(), 0);
    }

    #[test]
    fn release_deletes_program() {
        let mut device = RecordingDevice::new();
        let shader = Shader::new(&mut device, &test_shaders::position_only()).unwrap();
        assert_eq!(device.live_programs(), 1);
        shader.release(&mut device);
        assert_eq!(device.live_programs(), 0);
    }
}

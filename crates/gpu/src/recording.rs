//! Headless device that records every call.
//!
//! Programs are compiled and reflected with the same WGSL front end as the
//! GPU backend, so reflection behaves identically. Everything else is kept as
//! a command log for inspection by tests and tooling.

use crate::compile::{CompiledProgram, compile_program};
use crate::device::{
    ActiveAttribute, BufferKind, DeviceError, GraphicsDevice, ProgramSource, TextureDesc,
    UniformValue, VertexAttribute, Viewport,
};
use crate::shader::ShaderError;
use crate::state::{BlendFactor, ColorMask, CullFace, DepthFunc};
use glam::Vec4;
use lumen_common::{BufferHandle, ProgramHandle, TextureHandle, VertexArrayHandle};
use std::collections::{BTreeMap, HashMap};

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    UseProgram(ProgramHandle),
    SetUniform {
        program: Option<ProgramHandle>,
        name: String,
        value: UniformValue,
    },
    ConfigureVertexLayout {
        vertex_array: VertexArrayHandle,
        program: ProgramHandle,
        attributes: Vec<VertexAttribute>,
        stride: u32,
    },
    DrawIndexed {
        vertex_array: VertexArrayHandle,
        program: Option<ProgramHandle>,
        index_count: u32,
    },
    BindTexture {
        unit: u32,
        texture: TextureHandle,
    },
    FaceCulling {
        enabled: bool,
        face: CullFace,
    },
    DepthTest {
        enabled: bool,
        func: DepthFunc,
    },
    DepthWrite(bool),
    Blending {
        enabled: bool,
        src: BlendFactor,
        dst: BlendFactor,
    },
    ColorMask(ColorMask),
    BeginFrame {
        clear: Vec4,
    },
    EndFrame,
}

impl DeviceCommand {
    /// Whether this is one of the five pipeline toggles.
    pub fn is_state_change(&self) -> bool {
        matches!(
            self,
            Self::FaceCulling { .. }
                | Self::DepthTest { .. }
                | Self::DepthWrite(_)
                | Self::Blending { .. }
                | Self::ColorMask(_)
        )
    }
}

#[derive(Debug)]
struct RecordedProgram {
    label: String,
    attributes: Vec<ActiveAttribute>,
}

/// A [`GraphicsDevice`] with no GPU behind it.
#[derive(Debug)]
pub struct RecordingDevice {
    next_handle: u32,
    viewport: Viewport,
    programs: HashMap<ProgramHandle, RecordedProgram>,
    buffers: HashMap<BufferHandle, (BufferKind, usize)>,
    vertex_arrays: HashMap<VertexArrayHandle, (BufferHandle, BufferHandle)>,
    textures: HashMap<TextureHandle, String>,
    current_program: Option<ProgramHandle>,
    in_frame: bool,
    commands: Vec<DeviceCommand>,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::with_viewport(1280, 720)
    }

    pub fn with_viewport(width: u32, height: u32) -> Self {
        Self {
            next_handle: 1,
            viewport: Viewport { width, height },
            programs: HashMap::new(),
            buffers: HashMap::new(),
            vertex_arrays: HashMap::new(),
            textures: HashMap::new(),
            current_program: None,
            in_frame: false,
            commands: Vec::new(),
        }
    }

    fn allocate(&mut self) -> u32 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = Viewport { width, height };
    }

    pub fn commands(&self) -> &[DeviceCommand] {
        &self.commands
    }

    /// Drain the command log, keeping resources alive.
    pub fn take_commands(&mut self) -> Vec<DeviceCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn count(&self, predicate: impl Fn(&DeviceCommand) -> bool) -> usize {
        self.commands.iter().filter(|&c| predicate(c)).count()
    }

    pub fn state_changes(&self) -> usize {
        self.count(DeviceCommand::is_state_change)
    }

    pub fn layout_configurations(&self) -> usize {
        self.count(|c| matches!(c, DeviceCommand::ConfigureVertexLayout { .. }))
    }

    pub fn draw_count(&self) -> usize {
        self.count(|c| matches!(c, DeviceCommand::DrawIndexed { .. }))
    }

    /// Draws in submission order as `(program, vertex array)` pairs.
    pub fn draws(&self) -> Vec<(Option<ProgramHandle>, VertexArrayHandle)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::DrawIndexed {
                    vertex_array,
                    program,
                    ..
                } => Some((*program, *vertex_array)),
                _ => None,
            })
            .collect()
    }

    /// Most recent value written to uniform `name`, on any program.
    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.commands.iter().rev().find_map(|c| match c {
            DeviceCommand::SetUniform {
                name: n, value, ..
            } if n == name => Some(*value),
            _ => None,
        })
    }

    /// Every value written to uniform `name`, oldest first.
    pub fn uniform_history(&self, name: &str) -> Vec<UniformValue> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                DeviceCommand::SetUniform {
                    name: n, value, ..
                } if n == name => Some(*value),
                _ => None,
            })
            .collect()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn program_label(&self, program: ProgramHandle) -> Option<&str> {
        self.programs.get(&program).map(|p| p.label.as_str())
    }

    /// Buffer sizes in bytes by kind, for summaries.
    pub fn buffer_bytes(&self) -> BTreeMap<&'static str, usize> {
        let mut out = BTreeMap::new();
        for (kind, size) in self.buffers.values() {
            let key = match kind {
                BufferKind::Vertex => "vertex",
                BufferKind::Index => "index",
            };
            *out.entry(key).or_insert(0) += size;
        }
        out
    }
}

impl GraphicsDevice for RecordingDevice {
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, ShaderError> {
        let compiled: CompiledProgram = compile_program(source)?;
        let handle = ProgramHandle(self.allocate());
        self.programs.insert(
            handle,
            RecordedProgram {
                label: compiled.label.clone(),
                attributes: compiled.active_attributes(),
            },
        );
        Ok(handle)
    }

    fn active_attributes(&self, program: ProgramHandle) -> Vec<ActiveAttribute> {
        self.programs
            .get(&program)
            .map(|p| p.attributes.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
        self.commands.push(DeviceCommand::UseProgram(program));
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        self.programs.remove(&program);
        if self.current_program == Some(program) {
            self.current_program = None;
        }
    }

    fn set_uniform(&mut self, name: &str, value: UniformValue) {
        self.commands.push(DeviceCommand::SetUniform {
            program: self.current_program,
            name: name.to_string(),
            value,
        });
    }

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BufferHandle {
        let handle = BufferHandle(self.allocate());
        self.buffers.insert(handle, (kind, data.len()));
        handle
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn create_vertex_array(
        &mut self,
        vertices: BufferHandle,
        indices: BufferHandle,
    ) -> VertexArrayHandle {
        let handle = VertexArrayHandle(self.allocate());
        self.vertex_arrays.insert(handle, (vertices, indices));
        handle
    }

    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle) {
        self.vertex_arrays.remove(&vertex_array);
    }

    fn configure_vertex_layout(
        &mut self,
        vertex_array: VertexArrayHandle,
        program: ProgramHandle,
        attributes: &[VertexAttribute],
        stride: u32,
    ) {
        self.commands.push(DeviceCommand::ConfigureVertexLayout {
            vertex_array,
            program,
            attributes: attributes.to_vec(),
            stride,
        });
    }

    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: u32) {
        self.commands.push(DeviceCommand::DrawIndexed {
            vertex_array,
            program: self.current_program,
            index_count,
        });
    }

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle, DeviceError> {
        desc.validate()?;
        let handle = TextureHandle(self.allocate());
        self.textures.insert(handle, desc.label.clone());
        Ok(handle)
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureHandle) {
        self.commands
            .push(DeviceCommand::BindTexture { unit, texture });
    }

    fn delete_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn set_face_culling(&mut self, enabled: bool, face: CullFace) {
        self.commands
            .push(DeviceCommand::FaceCulling { enabled, face });
    }

    fn set_depth_test(&mut self, enabled: bool, func: DepthFunc) {
        self.commands.push(DeviceCommand::DepthTest { enabled, func });
    }

    fn set_depth_write(&mut self, enabled: bool) {
        self.commands.push(DeviceCommand::DepthWrite(enabled));
    }

    fn set_blending(&mut self, enabled: bool, src: BlendFactor, dst: BlendFactor) {
        self.commands
            .push(DeviceCommand::Blending { enabled, src, dst });
    }

    fn set_color_mask(&mut self, mask: ColorMask) {
        self.commands.push(DeviceCommand::ColorMask(mask));
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn begin_frame(&mut self, clear: Vec4) -> Result<(), DeviceError> {
        self.in_frame = true;
        self.commands.push(DeviceCommand::BeginFrame { clear });
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), DeviceError> {
        if !self.in_frame {
            return Err(DeviceError::NoFrame);
        }
        self.in_frame = false;
        self.commands.push(DeviceCommand::EndFrame);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_shaders;

    #[test]
    fn handles_are_never_zero() {
        let mut device = RecordingDevice::new();
        let buffer = device.create_buffer(BufferKind::Vertex, &[0; 12]);
        assert!(buffer.is_valid());
        let program = device.create_program(&test_shaders::full_layout()).unwrap();
        assert!(program.is_valid());
        assert_eq!(device.program_label(program), Some("full_layout"));
    }

    #[test]
    fn draws_remember_current_program() {
        let mut device = RecordingDevice::new();
        let program = device.create_program(&test_shaders::full_layout()).unwrap();
        let vb = device.create_buffer(BufferKind::Vertex, &[0; 32]);
        let ib = device.create_buffer(BufferKind::Index, &[0; 12]);
        let vao = device.create_vertex_array(vb, ib);
        device.use_program(program);
        device.draw_indexed(vao, 3);
        assert_eq!(device.draws(), vec![(Some(program), vao)]);
        assert_eq!(device.buffer_bytes().get("index"), Some(&12));
    }

    #[test]
    fn end_frame_requires_begin() {
        let mut device = RecordingDevice::new();
        assert!(matches!(device.end_frame(), Err(DeviceError::NoFrame)));
        device.begin_frame(Vec4::ZERO).unwrap();
        assert!(device.end_frame().is_ok());
    }

    #[test]
    fn invalid_texture_is_rejected() {
        let mut device = RecordingDevice::new();
        let desc = TextureDesc::rgba8("short", 4, 4, vec![0; 8]);
        assert!(device.create_texture(&desc).is_err());
        assert_eq!(device.live_textures(), 0);
    }
}

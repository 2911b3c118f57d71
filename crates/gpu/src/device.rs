use crate::shader::ShaderError;
use crate::state::{BlendFactor, ColorMask, CullFace, DepthFunc};
use glam::{Mat4, Vec4};
use lumen_common::{BufferHandle, ProgramHandle, TextureHandle, VertexArrayHandle};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
        }
    }
}

/// WGSL sources for one program, one source per stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource {
    pub label: String,
    pub vertex: String,
    pub fragment: String,
    pub vertex_entry: String,
    pub fragment_entry: String,
}

impl ProgramSource {
    pub const DEFAULT_VERTEX_ENTRY: &'static str = "vs_main";
    pub const DEFAULT_FRAGMENT_ENTRY: &'static str = "fs_main";

    pub fn new(
        label: impl Into<String>,
        vertex: impl Into<String>,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            vertex: vertex.into(),
            fragment: fragment.into(),
            vertex_entry: Self::DEFAULT_VERTEX_ENTRY.into(),
            fragment_entry: Self::DEFAULT_FRAGMENT_ENTRY.into(),
        }
    }

    pub fn source(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }

    pub fn entry(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex_entry,
            ShaderStage::Fragment => &self.fragment_entry,
        }
    }
}

/// Scalar family of a vertex attribute component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseKind {
    Float,
    Int,
    Uint,
}

/// Type of an active vertex input as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeType {
    Scalar(BaseKind),
    Vector(BaseKind, u8),
    Matrix { columns: u8, rows: u8 },
    /// A type the attribute binder has no layout for.
    Unsupported(String),
}

impl AttributeType {
    /// Component count and scalar kind, with matrices flattened column by column.
    pub fn components(&self) -> Option<(u32, BaseKind)> {
        match self {
            Self::Scalar(kind) => Some((1, *kind)),
            Self::Vector(kind, n) => Some((u32::from(*n), *kind)),
            Self::Matrix { columns, rows } => {
                Some((u32::from(*columns) * u32::from(*rows), BaseKind::Float))
            }
            Self::Unsupported(_) => None,
        }
    }
}

/// One entry of a linked program's active-attribute list.
///
/// `location` is `None` for inputs that cannot be fed from a vertex buffer,
/// such as built-in values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveAttribute {
    pub name: String,
    pub location: Option<u32>,
    pub ty: AttributeType,
}

/// Pointer description for one attribute inside an interleaved vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub kind: BaseKind,
    pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Value written to a named uniform of the current program.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    /// Little-endian bytes laid out as WGSL expects them in a uniform block.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Int(v) => v.to_le_bytes().to_vec(),
            Self::Float(v) => v.to_le_bytes().to_vec(),
            Self::Vec4(v) => bytemuck::cast_slice(&v.to_array()).to_vec(),
            Self::Mat4(m) => bytemuck::cast_slice(&m.to_cols_array()).to_vec(),
        }
    }
}

/// Size in pixels of the current render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Width over height, or `None` for a degenerate (minimized) target.
    pub fn aspect(&self) -> Option<f32> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some(self.width as f32 / self.height as f32)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    MirroredRepeat,
}

/// Sampling parameters attached to a texture at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SamplerDesc {
    pub min_filter: FilterMode,
    pub mag_filter: FilterMode,
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
}

/// Tightly packed RGBA8 pixel data for a 2D texture.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub sampler: SamplerDesc,
}

impl TextureDesc {
    pub fn rgba8(label: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            pixels,
            sampler: SamplerDesc::default(),
        }
    }

    /// A 1x1 texture of a single color.
    pub fn solid(label: impl Into<String>, color: [u8; 4]) -> Self {
        Self::rgba8(label, 1, 1, color.to_vec())
    }

    pub fn validate(&self) -> Result<(), DeviceError> {
        if self.width == 0 || self.height == 0 {
            return Err(DeviceError::EmptyTexture(self.label.clone()));
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.pixels.len() != expected {
            return Err(DeviceError::TextureSize {
                label: self.label.clone(),
                expected,
                actual: self.pixels.len(),
            });
        }
        Ok(())
    }
}

/// Errors raised by a graphics device outside of shader compilation.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("texture '{label}' expects {expected} bytes of RGBA8 data, got {actual}")]
    TextureSize {
        label: String,
        expected: usize,
        actual: usize,
    },
    #[error("texture '{0}' has a zero dimension")]
    EmptyTexture(String),
    #[error("render target unavailable: {0}")]
    Surface(String),
    #[error("no frame in progress")]
    NoFrame,
}

/// The GPU driver seam.
///
/// Mirrors an immediate-mode API: a current program, named uniforms on that
/// program, numbered texture units and global pipeline toggles. All of it is
/// implicit device state, sequenced by bind-then-draw.
pub trait GraphicsDevice {
    /// Compile and link a program. Failures carry the diagnostic text.
    fn create_program(&mut self, source: &ProgramSource) -> Result<ProgramHandle, ShaderError>;
    /// Vertex inputs the linked program actually reads.
    fn active_attributes(&self, program: ProgramHandle) -> Vec<ActiveAttribute>;
    fn use_program(&mut self, program: ProgramHandle);
    fn delete_program(&mut self, program: ProgramHandle);
    /// Write a uniform of the current program. Unknown names are ignored.
    fn set_uniform(&mut self, name: &str, value: UniformValue);

    fn create_buffer(&mut self, kind: BufferKind, data: &[u8]) -> BufferHandle;
    fn delete_buffer(&mut self, buffer: BufferHandle);
    fn create_vertex_array(
        &mut self,
        vertices: BufferHandle,
        indices: BufferHandle,
    ) -> VertexArrayHandle;
    fn delete_vertex_array(&mut self, vertex_array: VertexArrayHandle);
    /// Record the attribute pointers used when `vertex_array` is drawn with `program`.
    fn configure_vertex_layout(
        &mut self,
        vertex_array: VertexArrayHandle,
        program: ProgramHandle,
        attributes: &[VertexAttribute],
        stride: u32,
    );
    /// Draw `index_count` indices as a triangle list with the current program.
    fn draw_indexed(&mut self, vertex_array: VertexArrayHandle, index_count: u32);

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle, DeviceError>;
    fn bind_texture(&mut self, unit: u32, texture: TextureHandle);
    fn delete_texture(&mut self, texture: TextureHandle);

    fn set_face_culling(&mut self, enabled: bool, face: CullFace);
    fn set_depth_test(&mut self, enabled: bool, func: DepthFunc);
    fn set_depth_write(&mut self, enabled: bool);
    fn set_blending(&mut self, enabled: bool, src: BlendFactor, dst: BlendFactor);
    fn set_color_mask(&mut self, mask: ColorMask);

    fn viewport(&self) -> Viewport;
    fn begin_frame(&mut self, clear: Vec4) -> Result<(), DeviceError>;
    fn end_frame(&mut self) -> Result<(), DeviceError>;
}

use crate::program::GpuProgram;
use lumen_common::ProgramHandle;
use lumen_gpu::{BaseKind, BlendFactor, ColorMask, CullFace, DepthFunc, VertexAttribute};

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// The device toggles as last set, captured for each draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct RasterState {
    pub face_culling: bool,
    pub cull_face: CullFace,
    pub depth_test: bool,
    pub depth_func: DepthFunc,
    pub depth_write: bool,
    pub blending: bool,
    pub blend_src: BlendFactor,
    pub blend_dst: BlendFactor,
    pub color_mask: ColorMask,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            face_culling: true,
            cull_face: CullFace::Back,
            depth_test: true,
            depth_func: DepthFunc::Less,
            depth_write: true,
            blending: false,
            blend_src: BlendFactor::SrcAlpha,
            blend_dst: BlendFactor::OneMinusSrcAlpha,
            color_mask: ColorMask::ALL,
        }
    }
}

impl RasterState {
    /// Culling both faces discards every triangle.
    pub fn culls_everything(&self) -> bool {
        self.face_culling && self.cull_face == CullFace::FrontAndBack
    }

    pub fn cull_mode(&self) -> Option<wgpu::Face> {
        if !self.face_culling {
            return None;
        }
        match self.cull_face {
            CullFace::Front => Some(wgpu::Face::Front),
            CullFace::Back => Some(wgpu::Face::Back),
            CullFace::FrontAndBack => None,
        }
    }

    /// A disabled depth test also disables depth writes.
    pub fn depth_stencil(&self) -> wgpu::DepthStencilState {
        wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: self.depth_test && self.depth_write,
            depth_compare: if self.depth_test {
                compare_function(self.depth_func)
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: Default::default(),
            bias: Default::default(),
        }
    }

    pub fn blend(&self) -> Option<wgpu::BlendState> {
        self.blending.then(|| {
            let component = wgpu::BlendComponent {
                src_factor: blend_factor(self.blend_src),
                dst_factor: blend_factor(self.blend_dst),
                operation: wgpu::BlendOperation::Add,
            };
            wgpu::BlendState {
                color: component,
                alpha: component,
            }
        })
    }

    pub fn write_mask(&self) -> wgpu::ColorWrites {
        let mut mask = wgpu::ColorWrites::empty();
        let ColorMask { r, g, b, a } = self.color_mask;
        if r {
            mask |= wgpu::ColorWrites::RED;
        }
        if g {
            mask |= wgpu::ColorWrites::GREEN;
        }
        if b {
            mask |= wgpu::ColorWrites::BLUE;
        }
        if a {
            mask |= wgpu::ColorWrites::ALPHA;
        }
        mask
    }
}

fn compare_function(func: DepthFunc) -> wgpu::CompareFunction {
    match func {
        DepthFunc::Never => wgpu::CompareFunction::Never,
        DepthFunc::Less => wgpu::CompareFunction::Less,
        DepthFunc::Equal => wgpu::CompareFunction::Equal,
        DepthFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        DepthFunc::Greater => wgpu::CompareFunction::Greater,
        DepthFunc::NotEqual => wgpu::CompareFunction::NotEqual,
        DepthFunc::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        DepthFunc::Always => wgpu::CompareFunction::Always,
    }
}

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::OneMinusSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::DstColor => wgpu::BlendFactor::Dst,
        BlendFactor::OneMinusDstColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DstAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::OneMinusDstAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
    }
}

pub(crate) fn vertex_format(components: u32, kind: BaseKind) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    let format = match (kind, components) {
        (BaseKind::Float, 1) => F::Float32,
        (BaseKind::Float, 2) => F::Float32x2,
        (BaseKind::Float, 3) => F::Float32x3,
        (BaseKind::Float, 4) => F::Float32x4,
        (BaseKind::Int, 1) => F::Sint32,
        (BaseKind::Int, 2) => F::Sint32x2,
        (BaseKind::Int, 3) => F::Sint32x3,
        (BaseKind::Int, 4) => F::Sint32x4,
        (BaseKind::Uint, 1) => F::Uint32,
        (BaseKind::Uint, 2) => F::Uint32x2,
        (BaseKind::Uint, 3) => F::Uint32x3,
        (BaseKind::Uint, 4) => F::Uint32x4,
        _ => return None,
    };
    Some(format)
}

/// A vertex input declared by the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeclaredInput {
    pub location: u32,
    pub components: u32,
    pub kind: BaseKind,
}

/// Attribute pointers configured for one (vertex array, program) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct VertexLayout {
    pub stride: u32,
    pub attributes: Vec<VertexAttribute>,
}

/// Attributes for the pipeline's single vertex buffer.
///
/// Configured attributes are used as given. Declared inputs the program does
/// not read still need a source, so they are fed from offset 0.
pub(crate) fn vertex_attributes(
    layout: &VertexLayout,
    declared: &[DeclaredInput],
) -> Vec<wgpu::VertexAttribute> {
    declared
        .iter()
        .filter_map(|input| {
            let configured = layout
                .attributes
                .iter()
                .find(|a| a.location == input.location);
            let (components, kind, offset) = match configured {
                Some(a) => (a.components, a.kind, a.offset),
                None => (input.components, input.kind, 0),
            };
            let format = vertex_format(components, kind)?;
            if offset as u64 + format.size() > layout.stride as u64 {
                tracing::warn!(
                    location = input.location,
                    offset,
                    stride = layout.stride,
                    "vertex attribute does not fit the stride"
                );
                return None;
            }
            Some(wgpu::VertexAttribute {
                format,
                offset: offset as u64,
                shader_location: input.location,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub program: ProgramHandle,
    pub layout: VertexLayout,
    pub raster: RasterState,
}

pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    program: &GpuProgram,
    layout: &VertexLayout,
    raster: &RasterState,
    color_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let attributes = vertex_attributes(layout, &program.inputs);
    tracing::debug!(
        program = %program.label,
        attributes = attributes.len(),
        ?raster,
        "creating render pipeline"
    );

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&program.label),
        layout: Some(&program.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &program.vertex_module,
            entry_point: Some(&program.vertex_entry),
            compilation_options: Default::default(),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: layout.stride as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }],
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.fragment_module,
            entry_point: Some(&program.fragment_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: color_format,
                blend: raster.blend(),
                write_mask: raster.write_mask(),
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: raster.cull_mode(),
            ..Default::default()
        },
        depth_stencil: Some(raster.depth_stencil()),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position_layout() -> VertexLayout {
        VertexLayout {
            stride: 32,
            attributes: vec![VertexAttribute {
                location: 0,
                components: 3,
                kind: BaseKind::Float,
                offset: 0,
            }],
        }
    }

    #[test]
    fn disabled_depth_test_never_writes() {
        let raster = RasterState {
            depth_test: false,
            ..RasterState::default()
        };
        let ds = raster.depth_stencil();
        assert!(!ds.depth_write_enabled);
        assert_eq!(ds.depth_compare, wgpu::CompareFunction::Always);
    }

    #[test]
    fn default_state_culls_back_faces_without_blending() {
        let raster = RasterState::default();
        assert_eq!(raster.cull_mode(), Some(wgpu::Face::Back));
        assert!(raster.blend().is_none());
        assert_eq!(raster.write_mask(), wgpu::ColorWrites::ALL);
        assert!(raster.depth_stencil().depth_write_enabled);
    }

    #[test]
    fn front_and_back_culls_everything() {
        let raster = RasterState {
            cull_face: CullFace::FrontAndBack,
            ..RasterState::default()
        };
        assert!(raster.culls_everything());
        let off = RasterState {
            face_culling: false,
            ..raster
        };
        assert!(!off.culls_everything());
        assert_eq!(off.cull_mode(), None);
    }

    #[test]
    fn blending_maps_factors() {
        let raster = RasterState {
            blending: true,
            ..RasterState::default()
        };
        let blend = raster.blend().unwrap();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn partial_color_mask() {
        let raster = RasterState {
            color_mask: ColorMask::from_array([true, false, true, false]),
            ..RasterState::default()
        };
        assert_eq!(
            raster.write_mask(),
            wgpu::ColorWrites::RED | wgpu::ColorWrites::BLUE
        );
    }

    #[test]
    fn formats_cover_scalar_and_vector_kinds() {
        assert_eq!(vertex_format(3, BaseKind::Float), Some(wgpu::VertexFormat::Float32x3));
        assert_eq!(vertex_format(1, BaseKind::Uint), Some(wgpu::VertexFormat::Uint32));
        assert_eq!(vertex_format(16, BaseKind::Float), None);
    }

    #[test]
    fn unread_inputs_are_fed_from_offset_zero() {
        let declared = [
            DeclaredInput {
                location: 0,
                components: 3,
                kind: BaseKind::Float,
            },
            DeclaredInput {
                location: 1,
                components: 3,
                kind: BaseKind::Float,
            },
        ];
        let attributes = vertex_attributes(&position_layout(), &declared);
        assert_eq!(attributes.len(), 2);
        assert_eq!(attributes[1].shader_location, 1);
        assert_eq!(attributes[1].offset, 0);
    }

    #[test]
    fn configured_attributes_outside_declared_inputs_are_dropped() {
        let mut layout = position_layout();
        layout.attributes.push(VertexAttribute {
            location: 5,
            components: 2,
            kind: BaseKind::Float,
            offset: 24,
        });
        let declared = [DeclaredInput {
            location: 0,
            components: 3,
            kind: BaseKind::Float,
        }];
        let attributes = vertex_attributes(&layout, &declared);
        assert_eq!(attributes.len(), 1);
    }
}

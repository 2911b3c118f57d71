use crate::pipeline::DeclaredInput;
use lumen_gpu::compile::{CompiledProgram, ResourceKind};
use lumen_gpu::{ActiveAttribute, ProgramSource, ShaderError, ShaderStage, UniformValue};
use std::borrow::Cow;
use std::collections::HashMap;
use std::num::NonZeroU64;

/// CPU copy of one uniform block, written by name and snapshotted per draw.
#[derive(Debug)]
pub(crate) struct StagedBlock {
    pub size: u32,
    pub data: Vec<u8>,
}

/// A texture global and the unit it samples from.
#[derive(Debug)]
pub(crate) struct TextureBinding {
    pub name: String,
    pub unit: u32,
}

/// What sits at one binding of a bind group.
#[derive(Debug, Clone, Copy)]
pub(crate) enum GroupEntry {
    Block(usize),
    Texture(usize),
    /// Samples with the sampler of the texture at this index, if any.
    Sampler(Option<usize>),
}

#[derive(Debug)]
pub(crate) struct GroupLayout {
    pub layout: wgpu::BindGroupLayout,
    /// Sorted by binding number.
    pub entries: Vec<(u32, GroupEntry)>,
}

#[derive(Debug, Clone, Copy)]
enum UniformTarget {
    Member { block: usize, offset: u32, size: u32 },
    TextureUnit(usize),
}

/// A linked program resident on the device.
#[derive(Debug)]
pub(crate) struct GpuProgram {
    pub label: String,
    pub vertex_module: wgpu::ShaderModule,
    pub fragment_module: wgpu::ShaderModule,
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub attributes: Vec<ActiveAttribute>,
    pub inputs: Vec<DeclaredInput>,
    pub groups: Vec<GroupLayout>,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub blocks: Vec<StagedBlock>,
    pub textures: Vec<TextureBinding>,
    uniforms: HashMap<String, UniformTarget>,
}

impl GpuProgram {
    pub fn new(
        device: &wgpu::Device,
        source: &ProgramSource,
        compiled: CompiledProgram,
    ) -> Result<Self, ShaderError> {
        let vertex_module = create_module(device, source, ShaderStage::Vertex)?;
        let fragment_module = create_module(device, source, ShaderStage::Fragment)?;

        let attributes = compiled.active_attributes();
        let inputs = compiled
            .inputs
            .iter()
            .filter_map(|input| {
                let location = input.location?;
                let (components, kind) = input.ty.components()?;
                Some(DeclaredInput {
                    location,
                    components,
                    kind,
                })
            })
            .collect();

        let mut uniforms = HashMap::new();
        let mut blocks = Vec::new();
        let mut textures = Vec::new();
        // (group, binding) -> entry, before layouts are built.
        let mut bindings: Vec<(u32, u32, GroupEntry)> = Vec::new();

        for block in &compiled.uniform_blocks {
            let index = blocks.len();
            for member in &block.members {
                uniforms.entry(member.name.clone()).or_insert(UniformTarget::Member {
                    block: index,
                    offset: member.offset,
                    size: member.size,
                });
            }
            blocks.push(StagedBlock {
                size: block.size,
                data: vec![0; block.size as usize],
            });
            bindings.push((block.group, block.binding, GroupEntry::Block(index)));
        }

        for resource in compiled
            .resources
            .iter()
            .filter(|r| r.kind == ResourceKind::Texture)
        {
            let index = textures.len();
            uniforms.insert(resource.name.clone(), UniformTarget::TextureUnit(index));
            textures.push(TextureBinding {
                name: resource.name.clone(),
                unit: 0,
            });
            bindings.push((resource.group, resource.binding, GroupEntry::Texture(index)));
        }

        for sampler in compiled
            .resources
            .iter()
            .filter(|r| r.kind == ResourceKind::Sampler)
        {
            // A sampler pairs with the texture declared just before it.
            let paired = bindings.iter().find_map(|&(group, binding, entry)| match entry {
                GroupEntry::Texture(index)
                    if group == sampler.group && binding + 1 == sampler.binding =>
                {
                    Some(index)
                }
                _ => None,
            });
            bindings.push((sampler.group, sampler.binding, GroupEntry::Sampler(paired)));
        }

        let group_count = bindings
            .iter()
            .map(|&(group, _, _)| group + 1)
            .max()
            .unwrap_or(0);
        let groups: Vec<GroupLayout> = (0..group_count)
            .map(|group| {
                let mut entries: Vec<(u32, GroupEntry)> = bindings
                    .iter()
                    .filter(|&&(g, _, _)| g == group)
                    .map(|&(_, binding, entry)| (binding, entry))
                    .collect();
                entries.sort_by_key(|&(binding, _)| binding);
                let layout_entries: Vec<wgpu::BindGroupLayoutEntry> = entries
                    .iter()
                    .map(|&(binding, entry)| layout_entry(binding, entry, &blocks))
                    .collect();
                let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some(&format!("{}_group{group}", compiled.label)),
                    entries: &layout_entries,
                });
                GroupLayout { layout, entries }
            })
            .collect();

        let layout_refs: Vec<&wgpu::BindGroupLayout> = groups.iter().map(|g| &g.layout).collect();
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&compiled.label),
            bind_group_layouts: &layout_refs,
            push_constant_ranges: &[],
        });

        Ok(Self {
            label: compiled.label,
            vertex_module,
            fragment_module,
            vertex_entry: source.entry(ShaderStage::Vertex).to_owned(),
            fragment_entry: source.entry(ShaderStage::Fragment).to_owned(),
            attributes,
            inputs,
            groups,
            pipeline_layout,
            blocks,
            textures,
            uniforms,
        })
    }

    /// Write a named uniform. Integer writes to a texture name select its unit.
    pub fn set_uniform(&mut self, name: &str, value: UniformValue) {
        let Some(target) = self.uniforms.get(name).copied() else {
            tracing::trace!(program = %self.label, uniform = name, "unknown uniform ignored");
            return;
        };
        match (target, value) {
            (UniformTarget::Member { block, offset, size }, value) => {
                let bytes = value.to_bytes();
                let len = bytes.len().min(size as usize);
                let start = offset as usize;
                if let Some(slot) = self.blocks[block].data.get_mut(start..start + len) {
                    slot.copy_from_slice(&bytes[..len]);
                }
            }
            (UniformTarget::TextureUnit(index), UniformValue::Int(unit)) if unit >= 0 => {
                self.textures[index].unit = unit as u32;
            }
            (UniformTarget::TextureUnit(index), other) => {
                tracing::warn!(
                    program = %self.label,
                    texture = %self.textures[index].name,
                    value = ?other,
                    "texture unit must be a non-negative int"
                );
            }
        }
    }
}

fn layout_entry(binding: u32, entry: GroupEntry, blocks: &[StagedBlock]) -> wgpu::BindGroupLayoutEntry {
    let ty = match entry {
        GroupEntry::Block(index) => wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: true,
            min_binding_size: NonZeroU64::new(blocks[index].size as u64),
        },
        GroupEntry::Texture(_) => wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        GroupEntry::Sampler(_) => wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
    };
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
        ty,
        count: None,
    }
}

/// Create one stage's module, surfacing device-side validation as a
/// compile error.
fn create_module(
    device: &wgpu::Device,
    source: &ProgramSource,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&format!("{}_{stage}", source.label)),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.source(stage).to_owned())),
    });
    match pollster::block_on(device.pop_error_scope()) {
        None => Ok(module),
        Some(error) => Err(ShaderError::Compile {
            label: source.label.clone(),
            stage,
            log: error.to_string(),
        }),
    }
}

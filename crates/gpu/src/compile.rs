//! WGSL front end shared by every device backend.
//!
//! Each stage is parsed and validated on its own ("compile"), then the pair is
//! checked for interface agreement ("link"). Reflection walks the validated
//! vertex entry point to find which inputs the program actually reads.

use crate::device::{ActiveAttribute, AttributeType, BaseKind, ProgramSource, ShaderStage};
use crate::shader::ShaderError;
use naga::valid::{Capabilities, ModuleInfo, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, Expression, Handle, Module, TypeInner};
use std::collections::BTreeMap;

/// A parsed and validated shader stage.
#[derive(Debug)]
pub struct StageModule {
    pub module: Module,
    pub info: ModuleInfo,
    pub entry_index: usize,
}

/// A vertex-stage input as declared in WGSL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReflectedInput {
    pub name: String,
    pub location: Option<u32>,
    pub ty: AttributeType,
    /// Whether the entry point reads this input.
    pub active: bool,
}

/// A member of a uniform block, addressed by byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformMember {
    pub name: String,
    pub offset: u32,
    pub size: u32,
}

/// A `var<uniform>` struct bound at `(group, binding)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlock {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub size: u32,
    pub members: Vec<UniformMember>,
}

impl UniformBlock {
    pub fn member(&self, name: &str) -> Option<&UniformMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Texture,
    Sampler,
}

/// A texture or sampler global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBinding {
    pub name: String,
    pub group: u32,
    pub binding: u32,
    pub kind: ResourceKind,
}

/// Both stages of a linked program plus everything reflected from them.
#[derive(Debug)]
pub struct CompiledProgram {
    pub label: String,
    pub vertex: StageModule,
    pub fragment: StageModule,
    pub inputs: Vec<ReflectedInput>,
    pub uniform_blocks: Vec<UniformBlock>,
    pub resources: Vec<ResourceBinding>,
}

impl CompiledProgram {
    /// The driver-style active-attribute list: inputs the vertex stage reads.
    pub fn active_attributes(&self) -> Vec<ActiveAttribute> {
        self.inputs
            .iter()
            .filter(|input| input.active)
            .map(|input| ActiveAttribute {
                name: input.name.clone(),
                location: input.location,
                ty: input.ty.clone(),
            })
            .collect()
    }
}

/// Compile both stages of `source` and link them.
pub fn compile_program(source: &ProgramSource) -> Result<CompiledProgram, ShaderError> {
    let vertex = compile_stage(source, ShaderStage::Vertex)?;
    let fragment = compile_stage(source, ShaderStage::Fragment)?;

    let link_error = |log: String| ShaderError::Link {
        label: source.label.clone(),
        log,
    };

    check_interface(&vertex, &fragment).map_err(link_error)?;

    let mut blocks: BTreeMap<(u32, u32), UniformBlock> = BTreeMap::new();
    let mut resources: BTreeMap<(u32, u32), ResourceBinding> = BTreeMap::new();
    for stage in [&vertex, &fragment] {
        let (stage_blocks, stage_resources) = reflect_globals(&stage.module).map_err(link_error)?;
        for block in stage_blocks {
            match blocks.get(&(block.group, block.binding)) {
                Some(existing) if existing.size != block.size || existing.members != block.members => {
                    return Err(link_error(format!(
                        "uniform block at group {} binding {} differs between stages",
                        block.group, block.binding
                    )));
                }
                Some(_) => {}
                None => {
                    blocks.insert((block.group, block.binding), block);
                }
            }
        }
        for resource in stage_resources {
            resources
                .entry((resource.group, resource.binding))
                .or_insert(resource);
        }
    }

    let inputs = reflect_inputs(&vertex);
    tracing::debug!(
        program = %source.label,
        inputs = inputs.len(),
        uniform_blocks = blocks.len(),
        resources = resources.len(),
        "program linked"
    );

    Ok(CompiledProgram {
        label: source.label.clone(),
        vertex,
        fragment,
        inputs,
        uniform_blocks: blocks.into_values().collect(),
        resources: resources.into_values().collect(),
    })
}

/// Parse and validate a single stage, locating its entry point.
pub fn compile_stage(
    source: &ProgramSource,
    stage: ShaderStage,
) -> Result<StageModule, ShaderError> {
    let text = source.source(stage);
    let compile_error = |log: String| ShaderError::Compile {
        label: source.label.clone(),
        stage,
        log,
    };

    let module = naga::front::wgsl::parse_str(text).map_err(|e| compile_error(e.emit_to_string(text)))?;
    let info = Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| compile_error(error_chain(&e)))?;

    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };
    let entry = source.entry(stage);
    let entry_index = module
        .entry_points
        .iter()
        .position(|ep| ep.stage == wanted && ep.name == entry)
        .ok_or_else(|| compile_error(format!("no @{stage} entry point named '{entry}'")))?;

    Ok(StageModule {
        module,
        info,
        entry_index,
    })
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut out = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

fn location_of(binding: &Binding) -> Option<u32> {
    match binding {
        Binding::Location { location, .. } => Some(*location),
        Binding::BuiltIn(_) => None,
    }
}

fn scalar_kind(scalar: naga::Scalar) -> Option<BaseKind> {
    match (scalar.kind, scalar.width) {
        (naga::ScalarKind::Float, 4) => Some(BaseKind::Float),
        (naga::ScalarKind::Sint, 4) => Some(BaseKind::Int),
        (naga::ScalarKind::Uint, 4) => Some(BaseKind::Uint),
        _ => None,
    }
}

fn attribute_type(module: &Module, ty: Handle<naga::Type>) -> AttributeType {
    let unsupported = |scalar: naga::Scalar| {
        AttributeType::Unsupported(format!("{:?}{}", scalar.kind, u32::from(scalar.width) * 8))
    };
    match &module.types[ty].inner {
        TypeInner::Scalar(scalar) => {
            scalar_kind(*scalar).map_or_else(|| unsupported(*scalar), AttributeType::Scalar)
        }
        TypeInner::Vector { size, scalar } => scalar_kind(*scalar).map_or_else(
            || unsupported(*scalar),
            |kind| AttributeType::Vector(kind, *size as u8),
        ),
        TypeInner::Matrix {
            columns,
            rows,
            scalar,
        } => match scalar_kind(*scalar) {
            Some(BaseKind::Float) => AttributeType::Matrix {
                columns: *columns as u8,
                rows: *rows as u8,
            },
            _ => unsupported(*scalar),
        },
        other => AttributeType::Unsupported(format!("{other:?}")),
    }
}

/// Location-bound values passed through a binding or a struct of bindings.
fn interface_values(
    module: &Module,
    name: Option<&String>,
    ty: Handle<naga::Type>,
    binding: Option<&Binding>,
) -> Vec<(Option<u32>, String, AttributeType)> {
    if let Some(binding) = binding {
        return vec![(
            location_of(binding),
            name.cloned().unwrap_or_default(),
            attribute_type(module, ty),
        )];
    }
    match &module.types[ty].inner {
        TypeInner::Struct { members, .. } => members
            .iter()
            .filter_map(|m| {
                m.binding.as_ref().map(|b| {
                    (
                        location_of(b),
                        m.name.clone().unwrap_or_default(),
                        attribute_type(module, m.ty),
                    )
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn check_interface(vertex: &StageModule, fragment: &StageModule) -> Result<(), String> {
    let vs_function = &vertex.module.entry_points[vertex.entry_index].function;
    let outputs: BTreeMap<u32, (String, AttributeType)> = vs_function
        .result
        .as_ref()
        .map(|result| interface_values(&vertex.module, None, result.ty, result.binding.as_ref()))
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(location, name, ty)| location.map(|l| (l, (name, ty))))
        .collect();

    let fs_function = &fragment.module.entry_points[fragment.entry_index].function;
    for arg in &fs_function.arguments {
        for (location, name, ty) in
            interface_values(&fragment.module, arg.name.as_ref(), arg.ty, arg.binding.as_ref())
        {
            let Some(location) = location else { continue };
            match outputs.get(&location) {
                None => {
                    return Err(format!(
                        "fragment input '{name}' at location {location} is not written by the vertex stage"
                    ));
                }
                Some((out_name, out_ty)) if *out_ty != ty => {
                    return Err(format!(
                        "location {location}: vertex output '{out_name}' is {out_ty:?} but fragment input '{name}' is {ty:?}"
                    ));
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

fn reflect_globals(module: &Module) -> Result<(Vec<UniformBlock>, Vec<ResourceBinding>), String> {
    let mut blocks = Vec::new();
    let mut resources = Vec::new();
    for (_, global) in module.global_variables.iter() {
        let Some(binding) = &global.binding else { continue };
        let name = global.name.clone().unwrap_or_default();
        let inner = &module.types[global.ty].inner;
        match global.space {
            AddressSpace::Uniform => {
                let TypeInner::Struct { members, span } = inner else {
                    return Err(format!("uniform '{name}' must be a struct block"));
                };
                let offsets: Vec<u32> = members.iter().map(|m| m.offset).collect();
                let members = members
                    .iter()
                    .enumerate()
                    .map(|(i, m)| {
                        let end = offsets.get(i + 1).copied().unwrap_or(*span);
                        UniformMember {
                            name: m.name.clone().unwrap_or_default(),
                            offset: m.offset,
                            size: end - m.offset,
                        }
                    })
                    .collect();
                blocks.push(UniformBlock {
                    name,
                    group: binding.group,
                    binding: binding.binding,
                    size: *span,
                    members,
                });
            }
            AddressSpace::Handle => {
                let kind = match inner {
                    TypeInner::Image { .. } => ResourceKind::Texture,
                    TypeInner::Sampler { .. } => ResourceKind::Sampler,
                    _ => continue,
                };
                resources.push(ResourceBinding {
                    name,
                    group: binding.group,
                    binding: binding.binding,
                    kind,
                });
            }
            _ => {}
        }
    }
    Ok((blocks, resources))
}

/// Declared vertex inputs, flagged by whether the entry point reads them.
fn reflect_inputs(stage: &StageModule) -> Vec<ReflectedInput> {
    let module = &stage.module;
    let function = &module.entry_points[stage.entry_index].function;
    let info = stage.info.get_entry_point(stage.entry_index);

    let argument_expr = |index: usize| -> Option<Handle<Expression>> {
        function.expressions.iter().find_map(|(handle, expr)| match expr {
            Expression::FunctionArgument(i) if *i as usize == index => Some(handle),
            _ => None,
        })
    };

    let mut inputs = Vec::new();
    for (index, arg) in function.arguments.iter().enumerate() {
        let arg_expr = argument_expr(index);
        let arg_refs = arg_expr.map_or(0, |h| info[h].ref_count);

        if let Some(binding) = &arg.binding {
            inputs.push(ReflectedInput {
                name: arg.name.clone().unwrap_or_default(),
                location: location_of(binding),
                ty: attribute_type(module, arg.ty),
                active: arg_refs > 0,
            });
            continue;
        }

        let TypeInner::Struct { members, .. } = &module.types[arg.ty].inner else {
            continue;
        };
        // Member reads show up as AccessIndex on the argument. Any other
        // reference passes the whole struct along, so every member is live.
        let mut member_refs = vec![0usize; members.len()];
        let mut accesses = 0usize;
        if let Some(base) = arg_expr {
            for (handle, expr) in function.expressions.iter() {
                if let Expression::AccessIndex { base: b, index } = expr {
                    if *b == base {
                        accesses += 1;
                        if let Some(refs) = member_refs.get_mut(*index as usize) {
                            *refs += info[handle].ref_count;
                        }
                    }
                }
            }
        }
        let whole_struct_used = arg_refs > accesses;

        for (i, member) in members.iter().enumerate() {
            let Some(binding) = &member.binding else { continue };
            inputs.push(ReflectedInput {
                name: member.name.clone().unwrap_or_default(),
                location: location_of(binding),
                ty: attribute_type(module, member.ty),
                active: whole_struct_used || member_refs[i] > 0,
            });
        }
    }
    inputs
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENT: &str = r#"
@fragment
fn fs_main(@location(0) color: vec4<f32>) -> @location(0) vec4<f32> {
    return color;
}
"#;

    fn program(vertex: &str, fragment: &str) -> ProgramSource {
        ProgramSource::new("test", vertex, fragment)
    }

    #[test]
    fn struct_inputs_report_only_read_members() {
        let vertex = r#"
struct VertexInput {
    @location(0) aPosition: vec3<f32>,
    @location(1) aNormal: vec3<f32>,
    @location(2) aTexCoords: vec2<f32>,
};
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
};
@vertex
fn vs_main(v: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip = vec4<f32>(v.aPosition, 1.0);
    out.color = vec4<f32>(v.aTexCoords, 0.0, 1.0);
    return out;
}
"#;
        let compiled = compile_program(&program(vertex, FRAGMENT)).unwrap();
        assert_eq!(compiled.inputs.len(), 3);
        let active: Vec<String> = compiled
            .active_attributes()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(active, vec!["aPosition".to_string(), "aTexCoords".to_string()]);
    }

    #[test]
    fn builtin_arguments_have_no_location() {
        let vertex = r#"
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
};
@vertex
fn vs_main(@builtin(vertex_index) index: u32, @location(0) aPosition: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip = vec4<f32>(aPosition, f32(index));
    out.color = vec4<f32>(1.0);
    return out;
}
"#;
        let compiled = compile_program(&program(vertex, FRAGMENT)).unwrap();
        let attrs = compiled.active_attributes();
        let index = attrs.iter().find(|a| a.name == "index").unwrap();
        assert_eq!(index.location, None);
        assert_eq!(index.ty, AttributeType::Scalar(BaseKind::Uint));
        let position = attrs.iter().find(|a| a.name == "aPosition").unwrap();
        assert_eq!(position.location, Some(0));
    }

    #[test]
    fn syntax_error_reports_compile_stage() {
        let err = compile_program(&program("fn broken( {", FRAGMENT)).unwrap_err();
        match err {
            ShaderError::Compile { stage, log, .. } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert!(!log.is_empty());
            }
            other => panic!("expected compile error, got {other:?}"),
        }
    }

    #[test]
    fn missing_entry_point_is_a_compile_error() {
        let vertex = r#"
@vertex
fn main_vs() -> @builtin(position) vec4<f32> {
    return vec4<f32>(0.0);
}
"#;
        let err = compile_program(&program(vertex, FRAGMENT)).unwrap_err();
        assert!(matches!(
            err,
            ShaderError::Compile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
    }

    #[test]
    fn unmatched_fragment_input_fails_to_link() {
        let vertex = r#"
@vertex
fn vs_main(@location(0) aPosition: vec3<f32>) -> @builtin(position) vec4<f32> {
    return vec4<f32>(aPosition, 1.0);
}
"#;
        let err = compile_program(&program(vertex, FRAGMENT)).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn uniform_blocks_are_reflected_with_offsets() {
        let vertex = r#"
struct Uniforms {
    uModel: mat4x4<f32>,
    uTint: vec4<f32>,
};
@group(0) @binding(0) var<uniform> u: Uniforms;
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
};
@vertex
fn vs_main(@location(0) aPosition: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip = u.uModel * vec4<f32>(aPosition, 1.0);
    out.color = u.uTint;
    return out;
}
"#;
        let compiled = compile_program(&program(vertex, FRAGMENT)).unwrap();
        assert_eq!(compiled.uniform_blocks.len(), 1);
        let block = &compiled.uniform_blocks[0];
        assert_eq!(block.size, 80);
        assert_eq!(block.member("uModel").unwrap().offset, 0);
        assert_eq!(block.member("uTint").unwrap().offset, 64);
        assert_eq!(block.member("uTint").unwrap().size, 16);
    }

    #[test]
    fn textures_and_samplers_are_reflected() {
        let vertex = r#"
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};
@vertex
fn vs_main(@location(0) aPosition: vec3<f32>, @location(2) aTexCoords: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip = vec4<f32>(aPosition, 1.0);
    out.uv = aTexCoords;
    return out;
}
"#;
        let fragment = r#"
@group(1) @binding(0) var uAlbedoMap: texture_2d<f32>;
@group(1) @binding(1) var uAlbedoMapSampler: sampler;
@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(uAlbedoMap, uAlbedoMapSampler, uv);
}
"#;
        let compiled = compile_program(&program(vertex, fragment)).unwrap();
        assert_eq!(compiled.resources.len(), 2);
        assert_eq!(compiled.resources[0].name, "uAlbedoMap");
        assert_eq!(compiled.resources[0].kind, ResourceKind::Texture);
        assert_eq!(compiled.resources[1].kind, ResourceKind::Sampler);
    }
}

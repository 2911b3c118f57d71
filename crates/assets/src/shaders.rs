//! Built-in WGSL programs.
//!
//! All of them share one uniform block at group 0 holding the reserved
//! matrices and the material tint. Texture maps live in group 1, each
//! followed by its sampler at the next binding.

use lumen_gpu::ProgramSource;

pub const UNLIT_TINTED: &str = "unlit_tinted";
pub const UNLIT_TEXTURED: &str = "unlit_textured";
pub const SHADED_TINTED: &str = "shaded_tinted";

pub const BUILTIN_NAMES: [&str; 3] = [UNLIT_TINTED, UNLIT_TEXTURED, SHADED_TINTED];

const UNIFORMS: &str = r#"
struct Uniforms {
    uModel: mat4x4<f32>,
    uView: mat4x4<f32>,
    uProj: mat4x4<f32>,
    uTint: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> u: Uniforms;
"#;

const TINTED_VARYINGS: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
};
"#;

const TINTED_VERTEX: &str = r#"
@vertex
fn vs_main(@location(0) aPosition: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = u.uProj * u.uView * u.uModel * vec4<f32>(aPosition, 1.0);
    return out;
}
"#;

const TINTED_FRAGMENT: &str = r#"
@fragment
fn fs_main(v: VertexOutput) -> @location(0) vec4<f32> {
    return u.uTint;
}
"#;

const TEXTURED_VARYINGS: &str = r#"
struct VertexInput {
    @location(0) aPosition: vec3<f32>,
    @location(2) aTexCoords: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};
"#;

const TEXTURED_VERTEX: &str = r#"
@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = u.uProj * u.uView * u.uModel * vec4<f32>(vertex.aPosition, 1.0);
    out.uv = vertex.aTexCoords;
    return out;
}
"#;

const TEXTURED_FRAGMENT: &str = r#"
@group(1) @binding(0)
var uAlbedoMap: texture_2d<f32>;
@group(1) @binding(1)
var uAlbedoSampler: sampler;

@fragment
fn fs_main(v: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(uAlbedoMap, uAlbedoSampler, v.uv) * u.uTint;
}
"#;

const SHADED_VARYINGS: &str = r#"
struct VertexInput {
    @location(0) aPosition: vec3<f32>,
    @location(1) aNormal: vec3<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_normal: vec3<f32>,
};
"#;

const SHADED_VERTEX: &str = r#"
@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    let world_pos = u.uModel * vec4<f32>(vertex.aPosition, 1.0);
    let world_normal = (u.uModel * vec4<f32>(vertex.aNormal, 0.0)).xyz;

    var out: VertexOutput;
    out.clip_position = u.uProj * u.uView * world_pos;
    out.world_normal = normalize(world_normal);
    return out;
}
"#;

const SHADED_FRAGMENT: &str = r#"
@fragment
fn fs_main(v: VertexOutput) -> @location(0) vec4<f32> {
    let light_dir = normalize(vec3<f32>(0.3, 1.0, 0.5));
    let ambient = 0.3;
    let diffuse = max(dot(normalize(v.world_normal), light_dir), 0.0);
    let lighting = ambient + diffuse * 0.7;
    return vec4<f32>(u.uTint.rgb * lighting, u.uTint.a);
}
"#;

fn program(label: &str, varyings: &str, vertex: &str, fragment: &str) -> ProgramSource {
    ProgramSource::new(
        label,
        format!("{UNIFORMS}{varyings}{vertex}"),
        format!("{UNIFORMS}{varyings}{fragment}"),
    )
}

/// Source of the built-in program called `name`.
pub fn builtin(name: &str) -> Option<ProgramSource> {
    match name {
        UNLIT_TINTED => Some(program(name, TINTED_VARYINGS, TINTED_VERTEX, TINTED_FRAGMENT)),
        UNLIT_TEXTURED => Some(program(
            name,
            TEXTURED_VARYINGS,
            TEXTURED_VERTEX,
            TEXTURED_FRAGMENT,
        )),
        SHADED_TINTED => Some(program(name, SHADED_VARYINGS, SHADED_VERTEX, SHADED_FRAGMENT)),
        _ => None,
    }
}

/// Every built-in program, in [`BUILTIN_NAMES`] order.
pub fn builtins() -> Vec<ProgramSource> {
    BUILTIN_NAMES.iter().filter_map(|name| builtin(name)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_gpu::compile::{ResourceKind, compile_program};

    fn active_names(name: &str) -> Vec<String> {
        let source = builtin(name).unwrap();
        let compiled = compile_program(&source).unwrap();
        let mut names: Vec<String> = compiled
            .active_attributes()
            .into_iter()
            .map(|a| a.name)
            .collect();
        names.sort();
        names
    }

    #[test]
    fn all_builtins_link() {
        let sources = builtins();
        assert_eq!(sources.len(), BUILTIN_NAMES.len());
        for source in &sources {
            compile_program(source).unwrap();
        }
    }

    #[test]
    fn unknown_builtin_is_none() {
        assert!(builtin("pbr").is_none());
    }

    #[test]
    fn tinted_reads_position_only() {
        assert_eq!(active_names(UNLIT_TINTED), vec!["aPosition"]);
    }

    #[test]
    fn shaded_reads_normals() {
        assert_eq!(active_names(SHADED_TINTED), vec!["aNormal", "aPosition"]);
    }

    #[test]
    fn textured_reads_tex_coords() {
        assert_eq!(active_names(UNLIT_TEXTURED), vec!["aPosition", "aTexCoords"]);
    }

    #[test]
    fn textured_declares_albedo_with_sampler() {
        let compiled = compile_program(&builtin(UNLIT_TEXTURED).unwrap()).unwrap();
        let texture = compiled
            .resources
            .iter()
            .find(|r| r.kind == ResourceKind::Texture)
            .unwrap();
        assert_eq!(texture.name, "uAlbedoMap");
        assert_eq!((texture.group, texture.binding), (1, 0));
        let sampler = compiled
            .resources
            .iter()
            .find(|r| r.kind == ResourceKind::Sampler)
            .unwrap();
        assert_eq!((sampler.group, sampler.binding), (1, 1));
    }

    #[test]
    fn uniform_block_carries_reserved_names() {
        let compiled = compile_program(&builtin(SHADED_TINTED).unwrap()).unwrap();
        let block = &compiled.uniform_blocks[0];
        for name in ["uModel", "uView", "uProj", "uTint"] {
            assert!(block.member(name).is_some(), "{name}");
        }
    }
}

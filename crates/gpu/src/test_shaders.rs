//! Small WGSL programs shared by the unit tests.

use crate::device::ProgramSource;

const UNIFORMS: &str = r#"
struct Uniforms {
    uModel: mat4x4<f32>,
    uView: mat4x4<f32>,
    uProj: mat4x4<f32>,
    uTint: vec4<f32>,
};
@group(0) @binding(0) var<uniform> u: Uniforms;
"#;

pub const FRAGMENT: &str = r#"
struct Uniforms {
    uModel: mat4x4<f32>,
    uView: mat4x4<f32>,
    uProj: mat4x4<f32>,
    uTint: vec4<f32>,
};
@group(0) @binding(0) var<uniform> u: Uniforms;

@fragment
fn fs_main(@location(0) shade: vec4<f32>) -> @location(0) vec4<f32> {
    return shade * u.uTint;
}
"#;

/// Reads position, normal and texture coordinates.
pub fn full_layout() -> ProgramSource {
    let vertex = format!(
        "{UNIFORMS}{}",
        r#"
struct VertexInput {
    @location(0) aPosition: vec3<f32>,
    @location(1) aNormal: vec3<f32>,
    @location(2) aTexCoords: vec2<f32>,
};
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) shade: vec4<f32>,
};
@vertex
fn vs_main(v: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip = u.uProj * u.uView * u.uModel * vec4<f32>(v.aPosition, 1.0);
    out.shade = vec4<f32>(abs(v.aNormal), 1.0) * vec4<f32>(v.aTexCoords, 1.0, 1.0);
    return out;
}
"#
    );
    ProgramSource::new("full_layout", vertex, FRAGMENT)
}

/// Reads position only.
pub fn position_only() -> ProgramSource {
    let vertex = format!(
        "{UNIFORMS}{}",
        r#"
struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) shade: vec4<f32>,
};
@vertex
fn vs_main(@location(0) aPosition: vec3<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip = u.uProj * u.uView * u.uModel * vec4<f32>(aPosition, 1.0);
    out.shade = vec4<f32>(1.0);
    return out;
}
"#
    );
    ProgramSource::new("position_only", vertex, FRAGMENT)
}

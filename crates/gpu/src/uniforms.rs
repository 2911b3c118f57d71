//! Reserved shader interface names.

/// Object-to-world matrix.
pub const UNIFORM_MODEL: &str = "uModel";
/// World-to-view matrix.
pub const UNIFORM_VIEW: &str = "uView";
/// View-to-clip matrix.
pub const UNIFORM_PROJECTION: &str = "uProj";
/// Material color modulation.
pub const UNIFORM_TINT: &str = "uTint";

pub const SAMPLER_ALBEDO: &str = "uAlbedoMap";
pub const SAMPLER_SPECULAR: &str = "uSpecularMap";
pub const SAMPLER_NORMAL: &str = "uNormalMap";
pub const SAMPLER_EMISSIVE: &str = "uEmissiveMap";

pub const ATTR_POSITION: &str = "aPosition";
pub const ATTR_NORMAL: &str = "aNormal";
pub const ATTR_TEX_COORDS: &str = "aTexCoords";

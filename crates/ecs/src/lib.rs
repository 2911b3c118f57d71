//! Closed component model for scene nodes.
//!
//! A component is a capability attached to exactly one node. The set of
//! component kinds is closed: cameras and mesh renderers.
//!
//! # Invariants
//! - A component's owner is fixed when it is attached.
//! - Typed access goes through [`ComponentKind`]; a mismatched kind is `None`.

mod camera;

pub use camera::{Camera, CameraMatrices, Projection};

use lumen_gpu::{Material, MeshId};

/// Draws a mesh with a material at its node's world transform.
///
/// The mesh is referenced by id into a store owned elsewhere; the material is
/// owned outright. Either may be missing, in which case the renderer skips
/// the component.
#[derive(Debug, Clone, Default)]
pub struct MeshRenderer {
    pub mesh: Option<MeshId>,
    pub material: Option<Material>,
}

impl MeshRenderer {
    pub fn new(mesh: MeshId, material: Material) -> Self {
        Self {
            mesh: Some(mesh),
            material: Some(material),
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.material.as_ref().is_some_and(Material::is_transparent)
    }
}

/// Every component kind a node can carry.
#[derive(Debug, Clone)]
pub enum Component {
    Camera(Camera),
    MeshRenderer(MeshRenderer),
}

impl Component {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Camera(_) => "Camera",
            Self::MeshRenderer(_) => "MeshRenderer",
        }
    }
}

/// Typed view into a [`Component`].
pub trait ComponentKind: Into<Component> {
    fn from_component(component: &Component) -> Option<&Self>;
    fn from_component_mut(component: &mut Component) -> Option<&mut Self>;
}

impl From<Camera> for Component {
    fn from(camera: Camera) -> Self {
        Self::Camera(camera)
    }
}

impl From<MeshRenderer> for Component {
    fn from(renderer: MeshRenderer) -> Self {
        Self::MeshRenderer(renderer)
    }
}

impl ComponentKind for Camera {
    fn from_component(component: &Component) -> Option<&Self> {
        match component {
            Component::Camera(camera) => Some(camera),
            _ => None,
        }
    }

    fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
        match component {
            Component::Camera(camera) => Some(camera),
            _ => None,
        }
    }
}

impl ComponentKind for MeshRenderer {
    fn from_component(component: &Component) -> Option<&Self> {
        match component {
            Component::MeshRenderer(renderer) => Some(renderer),
            _ => None,
        }
    }

    fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
        match component {
            Component::MeshRenderer(renderer) => Some(renderer),
            _ => None,
        }
    }
}

pub fn crate_info() -> &'static str {
    "lumen-ecs v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("ecs"));
    }

    #[test]
    fn typed_access_matches_kind() {
        let component: Component = Camera::default().into();
        assert!(Camera::from_component(&component).is_some());
        assert!(MeshRenderer::from_component(&component).is_none());
        assert_eq!(component.kind_name(), "Camera");
    }

    #[test]
    fn mutable_access_edits_in_place() {
        let mut component: Component = Camera::default().into();
        Camera::from_component_mut(&mut component)
            .unwrap()
            .set_aspect(2.0);
        assert_eq!(Camera::from_component(&component).unwrap().aspect, 2.0);
    }

    #[test]
    fn empty_renderer_is_opaque() {
        let renderer = MeshRenderer::default();
        assert!(renderer.mesh.is_none());
        assert!(!renderer.is_transparent());
    }

    #[test]
    fn transparency_comes_from_material() {
        let renderer = MeshRenderer {
            mesh: None,
            material: Some(Material::tinted("glass", None, Vec4::ONE).with_transparent(true)),
        };
        assert!(renderer.is_transparent());
    }
}

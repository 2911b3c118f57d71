use crate::AssetError;
use crate::descriptor::MaterialDescriptor;
use crate::library::{ShaderLibrary, TextureLibrary};
use crate::primitives::MeshData;
use lumen_ecs::MeshRenderer;
use lumen_gpu::{GraphicsDevice, MeshId, MeshStore};
use lumen_kernel::{NodeId, SceneError, World};
use std::collections::BTreeMap;

/// One mesh of a model and the material it was authored with.
#[derive(Debug, Clone)]
pub struct ModelPart {
    pub mesh: MeshId,
    pub material: Option<MaterialDescriptor>,
}

/// Named group of meshes that spawn together.
#[derive(Debug, Clone, Default)]
pub struct Model {
    pub parts: Vec<ModelPart>,
}

/// Meshes resident on the device, grouped into named models.
///
/// Owns the [`MeshStore`] the renderer draws from.
#[derive(Debug, Default)]
pub struct ModelLibrary {
    meshes: MeshStore,
    models: BTreeMap<String, Model>,
}

impl ModelLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upload `data` and append it as a part of the model `name`.
    pub fn add_part(
        &mut self,
        device: &mut dyn GraphicsDevice,
        name: &str,
        data: &MeshData,
        material: Option<MaterialDescriptor>,
    ) -> MeshId {
        let mesh = self.meshes.insert(data.upload(device));
        self.models
            .entry(name.to_owned())
            .or_default()
            .parts
            .push(ModelPart { mesh, material });
        tracing::debug!(model = name, triangles = data.triangle_count(), "model part added");
        mesh
    }

    pub fn get(&self, name: &str) -> Option<&Model> {
        let model = self.models.get(name);
        if model.is_none() {
            tracing::warn!(model = name, "model not found");
        }
        model
    }

    /// First mesh of the model `name`.
    pub fn mesh(&self, name: &str) -> Option<MeshId> {
        self.get(name)?.parts.first().map(|part| part.mesh)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn meshes(&self) -> &MeshStore {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut MeshStore {
        &mut self.meshes
    }

    /// Instantiate model `name` as a node under `parent` (or as a root).
    ///
    /// Each part becomes a child node with a [`MeshRenderer`]. Parts without
    /// an authored material use `fallback`.
    pub fn spawn(
        &self,
        world: &mut World,
        name: &str,
        parent: Option<NodeId>,
        fallback: &MaterialDescriptor,
        shaders: &ShaderLibrary,
        textures: &TextureLibrary,
    ) -> Result<NodeId, AssetError> {
        let model = self.get(name).ok_or_else(|| AssetError::NotFound {
            kind: "model",
            name: name.to_owned(),
        })?;
        if let Some(parent) = parent.filter(|&p| !world.contains(p)) {
            return Err(SceneError::NodeNotFound(parent).into());
        }

        let root = world.create_node(name);
        let attach = |world: &mut World| -> Result<(), AssetError> {
            if let Some(parent) = parent {
                world.add_child(parent, root)?;
            }
            for (index, part) in model.parts.iter().enumerate() {
                let descriptor = part.material.as_ref().unwrap_or(fallback);
                let node = world.create_node(format!("{name}.{index}"));
                world.add_child(root, node)?;
                world.add_component(
                    node,
                    MeshRenderer::new(part.mesh, descriptor.build(shaders, textures)),
                )?;
            }
            Ok(())
        };
        // A failure part way through removes the whole subtree again.
        if let Err(e) = attach(world) {
            if let Err(cleanup) = world.destroy_node(root) {
                tracing::warn!(model = name, "failed to remove partial spawn: {cleanup}");
            }
            return Err(e);
        }
        tracing::debug!(model = name, parts = model.parts.len(), "model spawned");
        Ok(root)
    }

    /// Release every mesh and forget every model.
    pub fn release(&mut self, device: &mut dyn GraphicsDevice) {
        self.meshes.clear(device);
        self.models.clear();
    }
}

use crate::node::{Node, NodeId};
use glam::{Mat4, Vec3};
use lumen_ecs::{Camera, CameraMatrices, Component, ComponentKind};
use slotmap::{SlotMap, new_key_type};

new_key_type! {
    /// Generational key of a component in a [`World`].
    pub struct ComponentId;
}

/// Errors from hierarchy and component operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("node {0:?} does not exist")]
    NodeNotFound(NodeId),
    #[error("component {0:?} does not exist")]
    ComponentNotFound(ComponentId),
    #[error("attaching {child:?} under {parent:?} would make it its own ancestor")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },
}

#[derive(Debug)]
struct ComponentSlot {
    owner: NodeId,
    component: Component,
}

/// A typed component returned by [`World::query`].
#[derive(Debug)]
pub struct ComponentRef<'a, T> {
    pub id: ComponentId,
    pub owner: NodeId,
    pub component: &'a T,
}

/// The scene: every node and component, plus the hierarchy between nodes.
///
/// Node iteration and component queries follow node creation order, then
/// attachment order within a node.
#[derive(Debug, Default)]
pub struct World {
    nodes: SlotMap<NodeId, Node>,
    order: Vec<NodeId>,
    components: SlotMap<ComponentId, ComponentSlot>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the world.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of components attached across all nodes.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Create a root node with an identity transform.
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeId {
        let name = name.into();
        tracing::debug!(node = %name, "node created");
        let id = self.nodes.insert(Node::new(name));
        self.order.push(id);
        id
    }

    /// Get a node by id.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get a mutable node by id, e.g. to edit its transform.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Check whether `id` still names a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Nodes in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.order
            .iter()
            .filter_map(|&id| self.nodes.get(id).map(|n| (id, n)))
    }

    /// Nodes without a parent, in creation order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes()
            .filter(|(_, n)| n.parent.is_none())
            .map(|(id, _)| id)
            .collect()
    }

    /// First node, in creation order, with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes()
            .find(|(_, n)| n.name() == name)
            .map(|(id, _)| id)
    }

    /// Parent of `id`, or `None` for roots and unknown ids.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id).and_then(|n| n.parent)
    }

    /// Children of `id` in attachment order; empty for unknown ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes.get(id).map_or(&[], |n| n.children.as_slice())
    }

    fn require(&self, id: NodeId) -> Result<&Node, SceneError> {
        self.nodes.get(id).ok_or(SceneError::NodeNotFound(id))
    }

    /// Whether `ancestor` is `node` or lies on its parent chain.
    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    /// Attach `child` under `parent`, detaching it from any previous parent.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.require(parent)?;
        self.require(child)?;
        if self.is_ancestor(child, parent) {
            tracing::warn!(?parent, ?child, "rejected cyclic attachment");
            return Err(SceneError::Cycle { parent, child });
        }

        self.detach(child)?;
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(child) {
            c.parent = Some(parent);
        }
        Ok(())
    }

    /// Detach `child` from `parent`; it becomes a root.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), SceneError> {
        self.require(parent)?;
        if self.require(child)?.parent != Some(parent) {
            return Err(SceneError::NotAChild { parent, child });
        }
        self.detach(child)
    }

    /// Make `node` a root. No-op for a node that already is one.
    pub fn detach(&mut self, node: NodeId) -> Result<(), SceneError> {
        let Some(parent) = self.require(node)?.parent else {
            return Ok(());
        };
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.retain(|&c| c != node);
        }
        if let Some(n) = self.nodes.get_mut(node) {
            n.parent = None;
        }
        Ok(())
    }

    pub fn local_matrix(&self, id: NodeId) -> Option<Mat4> {
        self.nodes.get(id).map(|n| n.transform.local_matrix())
    }

    /// `parent.world * local`, walking the parent chain on every call.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let node = self.nodes.get(id)?;
        let mut matrix = node.transform.local_matrix();
        let mut current = node.parent;
        while let Some(parent_id) = current {
            let parent = self.nodes.get(parent_id)?;
            matrix = parent.transform.local_matrix() * matrix;
            current = parent.parent;
        }
        Some(matrix)
    }

    pub fn world_position(&self, id: NodeId) -> Option<Vec3> {
        self.world_matrix(id).map(|m| m.w_axis.truncate())
    }

    /// World-space -Z of the node.
    pub fn forward(&self, id: NodeId) -> Option<Vec3> {
        self.world_matrix(id)
            .map(|m| (-m.z_axis.truncate()).normalize_or_zero())
    }

    /// World-space +X of the node.
    pub fn right(&self, id: NodeId) -> Option<Vec3> {
        self.world_matrix(id)
            .map(|m| m.x_axis.truncate().normalize_or_zero())
    }

    /// World-space +Y of the node.
    pub fn up(&self, id: NodeId) -> Option<Vec3> {
        self.world_matrix(id)
            .map(|m| m.y_axis.truncate().normalize_or_zero())
    }

    /// Attach a component to `node`. The owner is fixed from here on.
    pub fn add_component(
        &mut self,
        node: NodeId,
        component: impl Into<Component>,
    ) -> Result<ComponentId, SceneError> {
        self.require(node)?;
        let component = component.into();
        tracing::debug!(?node, kind = component.kind_name(), "component attached");
        let id = self.components.insert(ComponentSlot {
            owner: node,
            component,
        });
        if let Some(n) = self.nodes.get_mut(node) {
            n.components.push(id);
        }
        Ok(id)
    }

    pub fn remove_component(&mut self, id: ComponentId) -> Option<Component> {
        let slot = self.components.remove(id)?;
        if let Some(n) = self.nodes.get_mut(slot.owner) {
            n.components.retain(|&c| c != id);
        }
        Some(slot.component)
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id).map(|s| &s.component)
    }

    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.get_mut(id).map(|s| &mut s.component)
    }

    pub fn owner(&self, id: ComponentId) -> Option<NodeId> {
        self.components.get(id).map(|s| s.owner)
    }

    pub fn get<T: ComponentKind>(&self, id: ComponentId) -> Option<&T> {
        self.component(id).and_then(T::from_component)
    }

    pub fn get_mut<T: ComponentKind>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.component_mut(id).and_then(T::from_component_mut)
    }

    /// First component of kind `T` on `node`.
    pub fn find_component<T: ComponentKind>(&self, node: NodeId) -> Option<ComponentId> {
        self.nodes
            .get(node)?
            .components
            .iter()
            .copied()
            .find(|&id| self.get::<T>(id).is_some())
    }

    /// Every component of kind `T`, in node creation order.
    pub fn query<T: ComponentKind>(&self) -> Vec<ComponentRef<'_, T>> {
        let mut out = Vec::new();
        for (owner, node) in self.nodes() {
            for &id in &node.components {
                if let Some(component) = self.get::<T>(id) {
                    out.push(ComponentRef {
                        id,
                        owner,
                        component,
                    });
                }
            }
        }
        out
    }

    /// View/projection matrices and eye position for a camera component.
    pub fn camera_matrices(&self, camera: ComponentId) -> Option<CameraMatrices> {
        let owner = self.owner(camera)?;
        let cam = self.get::<Camera>(camera)?;
        let world = self.world_matrix(owner)?;
        Some(CameraMatrices {
            view: cam.view_matrix(world),
            projection: cam.projection_matrix(),
            position: world.w_axis.truncate(),
        })
    }

    /// Destroy `node`, its descendants and all of their components.
    /// Returns how many nodes were removed.
    pub fn destroy_node(&mut self, node: NodeId) -> Result<usize, SceneError> {
        self.detach(node)?;
        let mut stack = vec![node];
        let mut removed = 0;
        while let Some(id) = stack.pop() {
            let Some(n) = self.nodes.remove(id) else {
                continue;
            };
            for component in n.components {
                self.components.remove(component);
            }
            stack.extend(n.children);
            removed += 1;
        }
        self.order.retain(|id| self.nodes.contains_key(*id));
        tracing::debug!(?node, removed, "subtree destroyed");
        Ok(removed)
    }

    /// Drop every node and component.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.components.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_common::Transform;
    use lumen_ecs::MeshRenderer;
    use lumen_gpu::Material;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn world_starts_empty() {
        let w = World::new();
        assert_eq!(w.node_count(), 0);
        assert!(w.roots().is_empty());
    }

    #[test]
    fn child_world_position_composes_with_parent() {
        let mut w = World::new();
        let parent = w.create_node("parent");
        let child = w.create_node("child");
        w.node_mut(parent).unwrap().transform = Transform::from_position(Vec3::new(1.0, 0.0, 0.0));
        w.node_mut(child).unwrap().transform = Transform::from_position(Vec3::new(0.0, 2.0, 0.0));

        w.add_child(parent, child).unwrap();
        assert!(approx(w.world_position(child).unwrap(), Vec3::new(1.0, 2.0, 0.0)));

        w.detach(child).unwrap();
        assert!(approx(w.world_position(child).unwrap(), Vec3::new(0.0, 2.0, 0.0)));
        assert_eq!(w.world_matrix(child), w.local_matrix(child));
    }

    #[test]
    fn world_transform_is_not_cached() {
        let mut w = World::new();
        let parent = w.create_node("parent");
        let child = w.create_node("child");
        w.add_child(parent, child).unwrap();
        assert!(approx(w.world_position(child).unwrap(), Vec3::ZERO));

        w.node_mut(parent).unwrap().transform.position = Vec3::new(0.0, 0.0, -4.0);
        assert!(approx(w.world_position(child).unwrap(), Vec3::new(0.0, 0.0, -4.0)));
    }

    #[test]
    fn reparenting_detaches_from_old_parent() {
        let mut w = World::new();
        let a = w.create_node("a");
        let b = w.create_node("b");
        let c = w.create_node("c");
        w.add_child(a, c).unwrap();
        w.add_child(b, c).unwrap();

        assert!(w.children(a).is_empty());
        assert_eq!(w.children(b), &[c]);
        assert_eq!(w.parent(c), Some(b));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut w = World::new();
        let a = w.create_node("a");
        let b = w.create_node("b");
        let c = w.create_node("c");
        w.add_child(a, b).unwrap();
        w.add_child(b, c).unwrap();

        assert!(matches!(w.add_child(c, a), Err(SceneError::Cycle { .. })));
        assert!(matches!(w.add_child(a, a), Err(SceneError::Cycle { .. })));
        // Hierarchy untouched by the failed attempts.
        assert_eq!(w.parent(a), None);
        assert_eq!(w.children(c), &[] as &[NodeId]);
    }

    #[test]
    fn remove_child_checks_parentage() {
        let mut w = World::new();
        let a = w.create_node("a");
        let b = w.create_node("b");
        assert!(matches!(
            w.remove_child(a, b),
            Err(SceneError::NotAChild { .. })
        ));
        w.add_child(a, b).unwrap();
        w.remove_child(a, b).unwrap();
        assert_eq!(w.roots(), vec![a, b]);
    }

    #[test]
    fn directions_follow_rotation() {
        let mut w = World::new();
        let n = w.create_node("cam");
        assert!(approx(w.forward(n).unwrap(), Vec3::NEG_Z));
        assert!(approx(w.right(n).unwrap(), Vec3::X));
        assert!(approx(w.up(n).unwrap(), Vec3::Y));

        w.node_mut(n).unwrap().transform.rotation.y = std::f32::consts::FRAC_PI_2;
        assert!(approx(w.forward(n).unwrap(), Vec3::NEG_X));
    }

    #[test]
    fn find_by_name_returns_first_match() {
        let mut w = World::new();
        let first = w.create_node("cube");
        w.create_node("cube");
        assert_eq!(w.find_by_name("cube"), Some(first));
        assert_eq!(w.find_by_name("sphere"), None);
    }

    #[test]
    fn query_returns_components_in_creation_order() {
        let mut w = World::new();
        let a = w.create_node("a");
        let b = w.create_node("b");
        let rb = w.add_component(b, MeshRenderer::default()).unwrap();
        let ra = w.add_component(a, MeshRenderer::default()).unwrap();
        w.add_component(a, Camera::default()).unwrap();

        let renderers = w.query::<MeshRenderer>();
        let ids: Vec<ComponentId> = renderers.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![ra, rb]);
        assert_eq!(renderers[0].owner, a);
        assert_eq!(w.query::<Camera>().len(), 1);
    }

    #[test]
    fn typed_component_access() {
        let mut w = World::new();
        let n = w.create_node("n");
        let id = w
            .add_component(
                n,
                MeshRenderer {
                    mesh: None,
                    material: Some(Material::tinted("m", None, glam::Vec4::ONE)),
                },
            )
            .unwrap();
        assert!(w.get::<MeshRenderer>(id).is_some());
        assert!(w.get::<Camera>(id).is_none());
        assert_eq!(w.owner(id), Some(n));
        assert_eq!(w.find_component::<MeshRenderer>(n), Some(id));
        assert_eq!(w.find_component::<Camera>(n), None);
    }

    #[test]
    fn add_component_to_missing_node_fails() {
        let mut w = World::new();
        let n = w.create_node("n");
        w.destroy_node(n).unwrap();
        assert!(matches!(
            w.add_component(n, Camera::default()),
            Err(SceneError::NodeNotFound(_))
        ));
    }

    #[test]
    fn camera_matrices_use_owner_transform() {
        let mut w = World::new();
        let n = w.create_node("camera");
        w.node_mut(n).unwrap().transform.position = Vec3::new(0.0, 1.0, 5.0);
        let cam = w.add_component(n, Camera::default()).unwrap();

        let m = w.camera_matrices(cam).unwrap();
        assert!(approx(m.position, Vec3::new(0.0, 1.0, 5.0)));
        assert!(approx(m.view.transform_point3(m.position), Vec3::ZERO));
    }

    #[test]
    fn destroy_node_removes_subtree_and_components() {
        let mut w = World::new();
        let root = w.create_node("root");
        let mid = w.create_node("mid");
        let leaf = w.create_node("leaf");
        let other = w.create_node("other");
        w.add_child(root, mid).unwrap();
        w.add_child(mid, leaf).unwrap();
        w.add_component(leaf, MeshRenderer::default()).unwrap();
        w.add_component(other, MeshRenderer::default()).unwrap();

        assert_eq!(w.destroy_node(mid).unwrap(), 2);
        assert!(w.children(root).is_empty());
        assert!(!w.contains(leaf));
        assert_eq!(w.component_count(), 1);
        assert_eq!(w.node_count(), 2);
    }

    #[test]
    fn clear_empties_everything() {
        let mut w = World::new();
        let n = w.create_node("n");
        w.add_component(n, Camera::default()).unwrap();
        w.clear();
        assert_eq!(w.node_count(), 0);
        assert_eq!(w.component_count(), 0);
        assert!(w.find_by_name("n").is_none());
    }
}

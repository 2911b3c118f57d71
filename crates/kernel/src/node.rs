use crate::world::ComponentId;
use lumen_common::Transform;
use slotmap::new_key_type;

new_key_type! {
    /// Generational key of a node in a [`crate::World`].
    pub struct NodeId;
}

/// A named transform in the hierarchy.
///
/// Links are ids into the owning world; the world keeps them consistent.
#[derive(Debug, Clone)]
pub struct Node {
    name: String,
    pub transform: Transform,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) components: Vec<ComponentId>,
}

impl Node {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            transform: Transform::default(),
            parent: None,
            children: Vec::new(),
            components: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn components(&self) -> &[ComponentId] {
        &self.components
    }
}

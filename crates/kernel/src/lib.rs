//! Scene graph: the authoritative node hierarchy and component ownership.
//!
//! # Invariants
//! - The parent/child graph is a forest: every node has at most one parent
//!   and no node is its own ancestor.
//! - World transforms are recomputed from the hierarchy on every query.
//! - Components are owned by the world and attached to exactly one node.

mod node;
mod world;

pub use node::{Node, NodeId};
pub use world::{ComponentId, ComponentRef, SceneError, World};

pub fn crate_info() -> &'static str {
    "lumen-kernel v0.1.0"
}

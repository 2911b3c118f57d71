use glam::{Mat4, Vec3};
use lumen_ecs::MeshRenderer;
use lumen_gpu::{MeshId, MeshStore};
use lumen_kernel::{ComponentId, NodeId, World};
use std::fmt;

/// Why a mesh renderer was left out of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    MissingMesh,
    MissingMaterial,
    /// The mesh id no longer resolves in the store.
    DanglingMesh,
    MissingShader,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingMesh => "no mesh",
            Self::MissingMaterial => "no material",
            Self::DanglingMesh => "mesh no longer exists",
            Self::MissingShader => "material has no shader",
        };
        f.write_str(text)
    }
}

/// One draw the frame will submit.
#[derive(Debug, Clone)]
pub struct DrawItem {
    pub component: ComponentId,
    pub node: NodeId,
    pub name: String,
    pub mesh: MeshId,
    /// Distance from the node's world position to the camera.
    pub distance: f32,
    pub model: Mat4,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub node: String,
    pub reason: SkipReason,
}

/// Draw order for one frame, split by transparency.
#[derive(Debug, Clone, Default)]
pub struct FramePlan {
    pub opaque: Vec<DrawItem>,
    pub transparent: Vec<DrawItem>,
    pub skipped: Vec<SkippedItem>,
}

impl FramePlan {
    /// Gather every drawable mesh renderer and sort it relative to `eye`.
    pub fn build(world: &World, eye: Vec3, meshes: &MeshStore) -> Self {
        let mut plan = Self::default();

        for entry in world.query::<MeshRenderer>() {
            let name = world
                .node(entry.owner)
                .map(|n| n.name().to_owned())
                .unwrap_or_default();
            let mesh = match check(entry.component, meshes) {
                Ok(mesh) => mesh,
                Err(reason) => {
                    tracing::warn!(node = %name, %reason, "skipping mesh renderer");
                    plan.skipped.push(SkippedItem { node: name, reason });
                    continue;
                }
            };
            let Some(model) = world.world_matrix(entry.owner) else {
                continue;
            };

            let item = DrawItem {
                component: entry.id,
                node: entry.owner,
                name,
                mesh,
                distance: model.w_axis.truncate().distance(eye),
                model,
            };
            if entry.component.is_transparent() {
                plan.transparent.push(item);
            } else {
                plan.opaque.push(item);
            }
        }

        plan.opaque.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        plan.transparent
            .sort_by(|a, b| b.distance.total_cmp(&a.distance));
        plan
    }

    pub fn draw_count(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    /// Opaque then transparent, in submission order.
    pub fn draws(&self) -> impl Iterator<Item = &DrawItem> {
        self.opaque.iter().chain(self.transparent.iter())
    }
}

fn check(renderer: &MeshRenderer, meshes: &MeshStore) -> Result<MeshId, SkipReason> {
    let mesh = renderer.mesh.ok_or(SkipReason::MissingMesh)?;
    let material = renderer
        .material
        .as_ref()
        .ok_or(SkipReason::MissingMaterial)?;
    if !meshes.contains(mesh) {
        return Err(SkipReason::DanglingMesh);
    }
    if material.shader().is_none() {
        return Err(SkipReason::MissingShader);
    }
    Ok(mesh)
}

impl fmt::Display for FramePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=== Frame plan ({} opaque, {} transparent, {} skipped) ===",
            self.opaque.len(),
            self.transparent.len(),
            self.skipped.len()
        )?;
        for item in &self.opaque {
            writeln!(f, "  opaque       {:<16} distance={:.2}", item.name, item.distance)?;
        }
        for item in &self.transparent {
            writeln!(f, "  transparent  {:<16} distance={:.2}", item.name, item.distance)?;
        }
        for item in &self.skipped {
            writeln!(f, "  skipped      {:<16} {}", item.node, item.reason)?;
        }
        Ok(())
    }
}

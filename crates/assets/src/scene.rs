use crate::descriptor::{AlphaMode, MaterialDescriptor};
use crate::shaders::SHADED_TINTED;
use crate::{AssetError, Assets, primitives};
use glam::{Vec3, Vec4};
use lumen_common::Transform;
use lumen_ecs::{Camera, MeshRenderer};
use lumen_gpu::GraphicsDevice;
use lumen_kernel::{ComponentId, NodeId, World};
use std::f32::consts::FRAC_PI_2;

pub const CUBE_MODEL: &str = "cube";
pub const PANE_MODEL: &str = "pane";
pub const GROUND_MODEL: &str = "ground";
pub const CHECKER_TEXTURE: &str = "checker";

/// Shape of the demo scene.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoSceneConfig {
    /// Opaque cubes in a row along X.
    pub cubes: usize,
    /// Transparent panes stacked along Z under a rotated pivot.
    pub panes: usize,
    pub spacing: f32,
    pub ground_size: f32,
    pub camera_height: f32,
    /// Distance of the camera from the origin along +Z.
    pub camera_distance: f32,
    /// Rotation of the pane pivot about Y, in radians.
    pub pivot_yaw: f32,
}

impl Default for DemoSceneConfig {
    fn default() -> Self {
        Self {
            cubes: 5,
            panes: 3,
            spacing: 2.0,
            ground_size: 20.0,
            camera_height: 4.0,
            camera_distance: 12.0,
            pivot_yaw: 0.3,
        }
    }
}

/// Nodes of a built demo scene.
#[derive(Debug, Clone)]
pub struct DemoScene {
    pub camera: ComponentId,
    pub camera_node: NodeId,
    pub ground: NodeId,
    pub cubes: Vec<NodeId>,
    pub pivot: NodeId,
    pub panes: Vec<NodeId>,
}

/// Populate `world` with a ground plane, a row of opaque cubes, transparent
/// panes parented to a pivot, and a camera looking at the origin.
///
/// Meshes are uploaded into `assets` on first use and shared by later builds.
pub fn build_demo_scene(
    world: &mut World,
    device: &mut dyn GraphicsDevice,
    assets: &mut Assets,
    config: &DemoSceneConfig,
) -> Result<DemoScene, AssetError> {
    ensure_models(device, assets, config)?;
    let Assets {
        shaders,
        textures,
        models,
    } = assets;

    let ground = models.spawn(
        world,
        GROUND_MODEL,
        None,
        &MaterialDescriptor::default(),
        shaders,
        textures,
    )?;

    let cube_mesh = models.mesh(CUBE_MODEL).ok_or_else(|| not_found(CUBE_MODEL))?;
    let mut cubes = Vec::with_capacity(config.cubes);
    for i in 0..config.cubes {
        let x = centered(i, config.cubes) * config.spacing;
        let node = world.create_node(format!("cube{i}"));
        set_transform(world, node, Transform::from_position(Vec3::new(x, 0.5, 0.0)))?;
        let material = MaterialDescriptor::tinted(format!("cube{i}"), hue(i, config.cubes))
            .with_shader(SHADED_TINTED)
            .build(shaders, textures);
        world.add_component(node, MeshRenderer::new(cube_mesh, material))?;
        cubes.push(node);
    }

    let pivot = world.create_node("pivot");
    set_transform(
        world,
        pivot,
        Transform::from_position(Vec3::new(0.0, 1.5, config.spacing))
            .with_rotation(Vec3::new(0.0, config.pivot_yaw, 0.0)),
    )?;
    let pane_mesh = models.mesh(PANE_MODEL).ok_or_else(|| not_found(PANE_MODEL))?;
    let mut panes = Vec::with_capacity(config.panes);
    for j in 0..config.panes {
        let z = centered(j, config.panes) * config.spacing * 0.75;
        let node = world.create_node(format!("pane{j}"));
        world.add_child(pivot, node)?;
        // The pane mesh faces +Y; stand it up to face +Z.
        set_transform(
            world,
            node,
            Transform::from_position(Vec3::new(0.0, 0.0, z))
                .with_rotation(Vec3::new(FRAC_PI_2, 0.0, 0.0))
                .with_scale(Vec3::splat(2.0)),
        )?;
        let tint = hue(j, config.panes).truncate().extend(0.35);
        let material = MaterialDescriptor::tinted(format!("pane{j}"), tint)
            .with_alpha_mode(AlphaMode::Blend)
            .with_double_sided(true)
            .build(shaders, textures);
        world.add_component(node, MeshRenderer::new(pane_mesh, material))?;
        panes.push(node);
    }

    let camera_node = world.create_node("camera");
    let pitch = -config.camera_height.atan2(config.camera_distance);
    set_transform(
        world,
        camera_node,
        Transform::from_position(Vec3::new(0.0, config.camera_height, config.camera_distance))
            .with_rotation(Vec3::new(pitch, 0.0, 0.0)),
    )?;
    let camera = world.add_component(camera_node, Camera::default())?;

    tracing::info!(
        cubes = cubes.len(),
        panes = panes.len(),
        nodes = world.node_count(),
        "demo scene built"
    );
    Ok(DemoScene {
        camera,
        camera_node,
        ground,
        cubes,
        pivot,
        panes,
    })
}

fn ensure_models(
    device: &mut dyn GraphicsDevice,
    assets: &mut Assets,
    config: &DemoSceneConfig,
) -> Result<(), AssetError> {
    if !assets.textures.contains(CHECKER_TEXTURE) {
        assets.textures.insert(
            device,
            crate::library::checkerboard(CHECKER_TEXTURE, 64, 8, [90, 90, 100, 255], [160, 160, 170, 255]),
        )?;
    }
    if !assets.models.contains(CUBE_MODEL) {
        assets
            .models
            .add_part(device, CUBE_MODEL, &primitives::cube(1.0), None);
    }
    if !assets.models.contains(PANE_MODEL) {
        assets
            .models
            .add_part(device, PANE_MODEL, &primitives::plane(1.0, 1), None);
    }
    if !assets.models.contains(GROUND_MODEL) {
        let material = MaterialDescriptor::textured(GROUND_MODEL, CHECKER_TEXTURE);
        assets.models.add_part(
            device,
            GROUND_MODEL,
            &primitives::plane(config.ground_size, 8),
            Some(material),
        );
    }
    Ok(())
}

fn set_transform(world: &mut World, node: NodeId, transform: Transform) -> Result<(), AssetError> {
    let n = world
        .node_mut(node)
        .ok_or(lumen_kernel::SceneError::NodeNotFound(node))?;
    n.transform = transform;
    Ok(())
}

fn not_found(name: &str) -> AssetError {
    AssetError::NotFound {
        kind: "model",
        name: name.to_owned(),
    }
}

/// Offset of item `i` of `n` from the center of the row, in item widths.
fn centered(i: usize, n: usize) -> f32 {
    i as f32 - (n.saturating_sub(1)) as f32 * 0.5
}

/// Evenly spaced fully saturated colors.
fn hue(i: usize, n: usize) -> Vec4 {
    let h = (i as f32 / n.max(1) as f32) * 6.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    Vec4::new(r, g, b, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_gpu::RecordingDevice;
    use lumen_render::{Renderer, RendererSettings};

    fn build(config: &DemoSceneConfig) -> (World, RecordingDevice, Assets, DemoScene) {
        let mut device = RecordingDevice::with_viewport(800, 600);
        let mut assets = Assets::with_builtins(&mut device).unwrap();
        let mut world = World::new();
        let scene = build_demo_scene(&mut world, &mut device, &mut assets, config).unwrap();
        (world, device, assets, scene)
    }

    fn teardown(mut world: World, mut device: RecordingDevice, mut assets: Assets) {
        world.clear();
        assets.release(&mut device);
        assert_eq!(device.live_programs(), 0);
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn node_counts_follow_config() {
        let config = DemoSceneConfig {
            cubes: 4,
            panes: 2,
            ..DemoSceneConfig::default()
        };
        let (world, device, assets, scene) = build(&config);
        assert_eq!(scene.cubes.len(), 4);
        assert_eq!(scene.panes.len(), 2);
        // ground root + ground part + cubes + pivot + panes + camera
        assert_eq!(world.node_count(), 2 + 4 + 1 + 2 + 1);
        assert_eq!(world.children(scene.pivot), scene.panes.as_slice());
        teardown(world, device, assets);
    }

    #[test]
    fn camera_looks_at_origin() {
        let (world, device, assets, scene) = build(&DemoSceneConfig::default());
        let eye = world.world_position(scene.camera_node).unwrap();
        let forward = world.forward(scene.camera_node).unwrap();
        assert!((forward - (-eye).normalize()).length() < 1e-4);
        teardown(world, device, assets);
    }

    #[test]
    fn renders_every_object() {
        let config = DemoSceneConfig::default();
        let (mut world, mut device, mut assets, scene) = build(&config);
        let mut renderer = Renderer::new(RendererSettings::default());
        let stats = renderer
            .render(&mut device, &mut world, scene.camera, assets.models.meshes_mut())
            .unwrap();
        assert_eq!(stats.opaque, config.cubes + 1);
        assert_eq!(stats.transparent, config.panes);
        assert_eq!(stats.skipped, 0);
        assert_eq!(device.draw_count(), config.cubes + 1 + config.panes);
        teardown(world, device, assets);
    }

    #[test]
    fn transparent_panes_draw_back_to_front() {
        let (world, device, assets, scene) = build(&DemoSceneConfig::default());
        let plan = Renderer::default()
            .plan(&world, scene.camera, assets.models.meshes())
            .unwrap();
        let distances: Vec<f32> = plan.transparent.iter().map(|d| d.distance).collect();
        assert!(distances.windows(2).all(|w| w[0] >= w[1]), "{distances:?}");
        let opaque: Vec<f32> = plan.opaque.iter().map(|d| d.distance).collect();
        assert!(opaque.windows(2).all(|w| w[0] <= w[1]), "{opaque:?}");
        teardown(world, device, assets);
    }

    #[test]
    fn rebuilding_reuses_meshes() {
        let config = DemoSceneConfig::default();
        let (mut world, mut device, mut assets, _) = build(&config);
        let meshes = assets.models.meshes().len();
        world.clear();
        build_demo_scene(&mut world, &mut device, &mut assets, &config).unwrap();
        assert_eq!(assets.models.meshes().len(), meshes);
        assert_eq!(assets.textures.len(), 2);
        teardown(world, device, assets);
    }

    #[test]
    fn hues_are_distinct() {
        let colors: Vec<Vec4> = (0..6).map(|i| hue(i, 6)).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert!((*a - *b).length() > 0.1);
            }
        }
    }
}

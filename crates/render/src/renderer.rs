use crate::plan::FramePlan;
use glam::Vec4;
use lumen_ecs::{Camera, MeshRenderer};
use lumen_gpu::uniforms::{UNIFORM_MODEL, UNIFORM_PROJECTION, UNIFORM_VIEW};
use lumen_gpu::{DeviceError, GraphicsDevice, MeshStore, StateCache};
use lumen_kernel::{ComponentId, World};

/// Errors that abort a whole frame. Per-entity problems are skipped instead.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("camera component {0:?} not found or has no owning node")]
    CameraNotFound(ComponentId),
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererSettings {
    pub clear_color: Vec4,
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            clear_color: Vec4::new(0.1, 0.1, 0.15, 1.0),
        }
    }
}

/// Counters for one rendered frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub opaque: usize,
    pub transparent: usize,
    pub skipped: usize,
    /// Pipeline states actually pushed to the device.
    pub state_changes: u64,
}

impl FrameStats {
    pub fn draws(&self) -> usize {
        self.opaque + self.transparent
    }
}

/// Draws a world through a camera, one frame per [`Renderer::render`] call.
///
/// The renderer owns the pipeline-state cache, so state de-duplication spans
/// frames for as long as the renderer lives.
#[derive(Debug, Default)]
pub struct Renderer {
    states: StateCache,
    settings: RendererSettings,
}

impl Renderer {
    pub fn new(settings: RendererSettings) -> Self {
        Self {
            states: StateCache::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &RendererSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RendererSettings {
        &mut self.settings
    }

    /// Forget the last applied pipeline state, e.g. after the device was
    /// recreated or touched by other code.
    pub fn invalidate_state(&mut self) {
        self.states.invalidate();
    }

    /// Plan the frame for `camera` without touching the device.
    pub fn plan(
        &self,
        world: &World,
        camera: ComponentId,
        meshes: &MeshStore,
    ) -> Result<FramePlan, RenderError> {
        let matrices = world
            .camera_matrices(camera)
            .ok_or(RenderError::CameraNotFound(camera))?;
        Ok(FramePlan::build(world, matrices.position, meshes))
    }

    /// Render one frame: opaque draws near to far, then transparent draws far
    /// to near.
    pub fn render(
        &mut self,
        device: &mut dyn GraphicsDevice,
        world: &mut World,
        camera: ComponentId,
        meshes: &mut MeshStore,
    ) -> Result<FrameStats, RenderError> {
        let _span = tracing::info_span!("frame").entered();

        let viewport = device.viewport();
        let cam = world
            .get_mut::<Camera>(camera)
            .ok_or(RenderError::CameraNotFound(camera))?;
        if let Some(aspect) = viewport.aspect() {
            cam.set_aspect(aspect);
        }

        let world: &World = world;
        let matrices = world
            .camera_matrices(camera)
            .ok_or(RenderError::CameraNotFound(camera))?;
        let plan = FramePlan::build(world, matrices.position, meshes);

        let applied_before = self.states.applied_count();
        device.begin_frame(self.settings.clear_color)?;

        for item in plan.draws() {
            let Some(material) = world
                .get::<MeshRenderer>(item.component)
                .and_then(|r| r.material.as_ref())
            else {
                continue;
            };
            let (Some(shader), Some(mesh)) = (material.shader(), meshes.get_mut(item.mesh)) else {
                continue;
            };

            material.bind(&mut self.states, device);
            shader.set_mat4(device, UNIFORM_MODEL, item.model);
            shader.set_mat4(device, UNIFORM_VIEW, matrices.view);
            shader.set_mat4(device, UNIFORM_PROJECTION, matrices.projection);
            material.setup(device);
            mesh.draw(device, shader);
        }

        device.end_frame()?;

        let stats = FrameStats {
            opaque: plan.opaque.len(),
            transparent: plan.transparent.len(),
            skipped: plan.skipped.len(),
            state_changes: self.states.applied_count() - applied_before,
        };
        tracing::debug!(
            opaque = stats.opaque,
            transparent = stats.transparent,
            skipped = stats.skipped,
            state_changes = stats.state_changes,
            "frame rendered"
        );
        Ok(stats)
    }
}

use anyhow::Result;
use clap::Parser;
use glam::Vec3;
use lumen_assets::{Assets, DemoScene, DemoSceneConfig, build_demo_scene};
use lumen_gpu::DeviceError;
use lumen_input::{Action, FlyController, InputState};
use lumen_kernel::World;
use lumen_render::{RenderError, Renderer, RendererSettings};
use lumen_render_wgpu::{WgpuDevice, WgpuSettings};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{DeviceEvent, ElementState, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

#[derive(Parser, Clone)]
#[command(name = "lumen-desktop", about = "Lumen demo scene viewer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[arg(long, default_value = "1280")]
    width: u32,

    #[arg(long, default_value = "720")]
    height: u32,

    /// Number of opaque cubes
    #[arg(long, default_value = "5")]
    cubes: usize,

    /// Number of transparent panes
    #[arg(long, default_value = "3")]
    panes: usize,
}

fn action_for(key: KeyCode) -> Option<Action> {
    match key {
        KeyCode::KeyW => Some(Action::MoveForward),
        KeyCode::KeyS => Some(Action::MoveBackward),
        KeyCode::KeyA => Some(Action::MoveLeft),
        KeyCode::KeyD => Some(Action::MoveRight),
        KeyCode::Space => Some(Action::MoveUp),
        KeyCode::ControlLeft => Some(Action::MoveDown),
        KeyCode::ShiftLeft => Some(Action::Sprint),
        _ => None,
    }
}

/// Everything that lives on the GPU device, created once a window exists.
struct Session {
    device: WgpuDevice,
    world: World,
    assets: Assets,
    scene: DemoScene,
    renderer: Renderer,
    input: InputState,
    fly: FlyController,
    last_frame: Instant,
}

impl Session {
    fn new(window: Arc<Window>, cli: &Cli) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let size = window.inner_size();
        let mut device =
            WgpuDevice::for_surface(&instance, surface, size.width, size.height, &WgpuSettings::default())?;

        let mut assets = Assets::with_builtins(&mut device)?;
        let mut world = World::new();
        let config = DemoSceneConfig {
            cubes: cli.cubes,
            panes: cli.panes,
            ..DemoSceneConfig::default()
        };
        let scene = build_demo_scene(&mut world, &mut device, &mut assets, &config)?;
        let eye = world.world_position(scene.camera_node).unwrap_or(Vec3::Z);

        Ok(Self {
            device,
            world,
            assets,
            scene,
            renderer: Renderer::new(RendererSettings::default()),
            input: InputState::new(),
            fly: FlyController::looking_at(eye, Vec3::ZERO),
            last_frame: Instant::now(),
        })
    }

    fn frame(&mut self) {
        let now = Instant::now();
        let dt = (now - self.last_frame).as_secs_f32().min(0.1);
        self.last_frame = now;

        if let Err(e) = self
            .fly
            .update(&mut self.world, self.scene.camera_node, &mut self.input, dt)
        {
            tracing::error!("camera update failed: {e}");
        }

        match self.renderer.render(
            &mut self.device,
            &mut self.world,
            self.scene.camera,
            self.assets.models.meshes_mut(),
        ) {
            Ok(stats) => tracing::trace!(
                draws = stats.draws(),
                skipped = stats.skipped,
                state_changes = stats.state_changes,
                "frame rendered"
            ),
            Err(RenderError::Device(DeviceError::Surface(reason))) => {
                tracing::debug!(%reason, "frame skipped");
            }
            Err(e) => tracing::error!("render failed: {e}"),
        }
    }

    fn shutdown(&mut self) {
        self.world.clear();
        self.assets.release(&mut self.device);
        tracing::info!("resources released");
    }
}

struct GpuApp {
    cli: Cli,
    window: Option<Arc<Window>>,
    session: Option<Session>,
}

impl GpuApp {
    fn new(cli: Cli) -> Self {
        Self {
            cli,
            window: None,
            session: None,
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("Lumen")
            .with_inner_size(PhysicalSize::new(self.cli.width, self.cli.height));
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                tracing::error!("failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };

        match Session::new(window.clone(), &self.cli) {
            Ok(session) => {
                self.session = Some(session);
                self.window = Some(window);
            }
            Err(e) => {
                tracing::error!("failed to start renderer: {e:#}");
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(session) = &mut self.session else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                session.device.resize(new_size.width, new_size.height);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        state: key_state,
                        ..
                    },
                ..
            } => {
                let pressed = key_state == ElementState::Pressed;
                if key == KeyCode::Escape && pressed {
                    event_loop.exit();
                } else if let Some(action) = action_for(key) {
                    session.input.set(action, pressed);
                }
            }
            WindowEvent::MouseInput {
                button: MouseButton::Right,
                state: btn_state,
                ..
            } => {
                session
                    .input
                    .set_looking(btn_state == ElementState::Pressed);
                if let Some(window) = &self.window {
                    window.set_cursor_visible(!session.input.is_looking());
                }
            }
            WindowEvent::Focused(false) => {
                session.input.clear();
            }
            WindowEvent::RedrawRequested => {
                session.frame();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if let (DeviceEvent::MouseMotion { delta }, Some(session)) = (event, &mut self.session) {
            session.input.add_look(delta.0 as f32, delta.1 as f32);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = &mut self.session {
            session.shutdown();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    tracing::info!("lumen-desktop starting");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(cli);
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movement_keys_map_to_actions() {
        assert_eq!(action_for(KeyCode::KeyW), Some(Action::MoveForward));
        assert_eq!(action_for(KeyCode::ControlLeft), Some(Action::MoveDown));
        assert_eq!(action_for(KeyCode::ShiftLeft), Some(Action::Sprint));
        assert_eq!(action_for(KeyCode::KeyQ), None);
    }

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["lumen-desktop"]);
        assert_eq!((cli.width, cli.height), (1280, 720));
        assert_eq!(cli.cubes, 5);
        assert!(!cli.verbose);
    }
}

use anyhow::Context;
use clap::{Parser, Subcommand};
use lumen_assets::{Assets, DemoSceneConfig, MaterialDescriptor, build_demo_scene, shaders};
use lumen_gpu::compile::compile_program;
use lumen_gpu::{GraphicsDevice, ProgramSource, RecordingDevice, Shader};
use lumen_kernel::World;
use lumen_render::{FrameStats, Renderer, RendererSettings};
use lumen_render_wgpu::{WgpuDevice, WgpuSettings};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumen-cli", about = "CLI tool for lumen engine operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print engine version and crate info
    Info,
    /// List the built-in shader programs and what they read
    Shaders,
    /// Compile a program and print its reflected interface
    Reflect {
        /// Name of a built-in program
        #[arg(long, conflicts_with_all = ["vertex", "fragment"])]
        builtin: Option<String>,
        /// WGSL file with the vertex stage
        #[arg(long, requires = "fragment")]
        vertex: Option<PathBuf>,
        /// WGSL file with the fragment stage
        #[arg(long, requires = "vertex")]
        fragment: Option<PathBuf>,
    },
    /// Build the demo scene and print the frame plan
    Frame {
        /// Number of opaque cubes
        #[arg(long, default_value = "5")]
        cubes: usize,
        /// Number of transparent panes
        #[arg(long, default_value = "3")]
        panes: usize,
        #[arg(long, default_value = "1280")]
        width: u32,
        #[arg(long, default_value = "720")]
        height: u32,
        /// Frames to render; later frames show pipeline-state reuse
        #[arg(long, default_value = "2")]
        frames: u32,
        /// Render on a headless GPU instead of the recording device
        #[arg(long)]
        gpu: bool,
    },
    /// Validate a JSON file of material descriptors
    Materials {
        /// Path to a JSON array of material descriptors
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("lumen-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", lumen_common::crate_info());
            println!("gpu: {}", lumen_gpu::crate_info());
            println!("ecs: {}", lumen_ecs::crate_info());
            println!("kernel: {}", lumen_kernel::crate_info());
            println!("render: {}", lumen_render::crate_info());
            println!("render-wgpu: {}", lumen_render_wgpu::crate_info());
            println!("assets: {}", lumen_assets::crate_info());
            println!("input: {}", lumen_input::crate_info());
        }
        Commands::Shaders => {
            let mut device = RecordingDevice::new();
            for source in shaders::builtins() {
                let shader = Shader::new(&mut device, &source)?;
                let names: Vec<&str> = sorted_attributes(&shader)
                    .into_iter()
                    .map(|(name, ..)| name)
                    .collect();
                println!("{:<16} reads {}", source.label, names.join(", "));
                shader.release(&mut device);
            }
        }
        Commands::Reflect {
            builtin,
            vertex,
            fragment,
        } => {
            let source = match (builtin, vertex, fragment) {
                (Some(name), _, _) => shaders::builtin(&name)
                    .with_context(|| format!("no built-in program named '{name}'"))?,
                (None, Some(vertex), Some(fragment)) => {
                    let label = vertex
                        .file_stem()
                        .map(|s| s.to_string_lossy().into_owned())
                        .unwrap_or_else(|| "program".into());
                    ProgramSource::new(
                        label,
                        std::fs::read_to_string(&vertex)
                            .with_context(|| format!("reading {}", vertex.display()))?,
                        std::fs::read_to_string(&fragment)
                            .with_context(|| format!("reading {}", fragment.display()))?,
                    )
                }
                _ => anyhow::bail!("pass --builtin, or both --vertex and --fragment"),
            };
            reflect(&source)?;
        }
        Commands::Frame {
            cubes,
            panes,
            width,
            height,
            frames,
            gpu,
        } => {
            let config = DemoSceneConfig {
                cubes,
                panes,
                ..DemoSceneConfig::default()
            };
            if gpu {
                let mut device = WgpuDevice::headless(width, height, &WgpuSettings::default())?;
                render_demo(&mut device, &config, frames)?;
                println!("Pipelines created: {}", device.pipeline_count());
            } else {
                let mut device = RecordingDevice::with_viewport(width, height);
                render_demo(&mut device, &config, frames)?;
                println!(
                    "Device: {} commands, {} state changes, {} layout configurations",
                    device.commands().len(),
                    device.state_changes(),
                    device.layout_configurations()
                );
            }
        }
        Commands::Materials { file } => {
            let materials = lumen_assets::load_materials(&file)?;
            let mut device = RecordingDevice::new();
            let assets = Assets::with_builtins(&mut device)?;
            let mut unresolved = 0;
            for desc in &materials {
                print_material(desc);
                if !assets.shaders.contains(desc.shader_name()) {
                    println!("  ! shader '{}' is not a built-in", desc.shader_name());
                    unresolved += 1;
                }
            }
            println!("{} materials, {unresolved} with unknown shaders", materials.len());
        }
    }

    Ok(())
}

fn sorted_attributes(shader: &Shader) -> Vec<(&str, u32, u32)> {
    let mut attributes: Vec<(&str, u32, u32)> = shader
        .attributes()
        .map(|(name, info)| (name, info.location, info.components))
        .collect();
    attributes.sort_by_key(|&(_, location, _)| location);
    attributes
}

fn reflect(source: &ProgramSource) -> anyhow::Result<()> {
    let mut device = RecordingDevice::new();
    let shader = Shader::new(&mut device, source)?;
    println!("=== {} ===", source.label);
    println!("Active attributes:");
    for (name, location, components) in sorted_attributes(&shader) {
        println!("  @location({location}) {name}: {components} components");
    }

    let compiled = compile_program(source)?;
    for block in &compiled.uniform_blocks {
        println!(
            "Uniform block '{}' @group({}) @binding({}) {} bytes:",
            block.name, block.group, block.binding, block.size
        );
        for member in &block.members {
            println!("  +{:<4} {} ({} bytes)", member.offset, member.name, member.size);
        }
    }
    for resource in &compiled.resources {
        println!(
            "{:?} '{}' @group({}) @binding({})",
            resource.kind, resource.name, resource.group, resource.binding
        );
    }
    shader.release(&mut device);
    Ok(())
}

fn render_demo(
    device: &mut dyn GraphicsDevice,
    config: &DemoSceneConfig,
    frames: u32,
) -> anyhow::Result<()> {
    let mut assets = Assets::with_builtins(device)?;
    let mut world = World::new();
    let scene = build_demo_scene(&mut world, device, &mut assets, config)?;
    let mut renderer = Renderer::new(RendererSettings::default());

    // Aspect is refreshed by the first render; plan after it.
    for frame in 1..=frames {
        let stats = renderer.render(device, &mut world, scene.camera, assets.models.meshes_mut())?;
        if frame == 1 {
            let plan = renderer.plan(&world, scene.camera, assets.models.meshes())?;
            print!("{plan}");
        }
        print_stats(frame, &stats);
    }

    world.clear();
    assets.release(device);
    Ok(())
}

fn print_stats(frame: u32, stats: &FrameStats) {
    println!(
        "Frame {frame}: {} draws ({} opaque, {} transparent), {} skipped, {} pipeline state changes",
        stats.draws(),
        stats.opaque,
        stats.transparent,
        stats.skipped,
        stats.state_changes
    );
}

fn print_material(desc: &MaterialDescriptor) {
    let state = desc.resolved_pipeline_state();
    println!(
        "{} [{:?}] shader={} transparent={} culling={} depth_write={} blending={}",
        desc.name,
        desc.kind,
        desc.shader_name(),
        desc.is_transparent(),
        state.face_culling,
        state.depth_mask,
        state.blending
    );
}

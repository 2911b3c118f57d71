use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use lumen_assets::shaders;
use lumen_gpu::compile::compile_program;
use std::path::PathBuf;
use std::process::Command;

#[derive(Parser)]
#[command(name = "xtask", about = "Workspace automation for lumen")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all checks: fmt, clippy, tests, shaders, doc
    Check,
    /// Run cargo fmt --check on all crates
    Fmt,
    /// Run clippy on all crates
    Clippy,
    /// Run all tests
    Test,
    /// Run cargo deny check
    Deny,
    /// Build rustdoc for the workspace
    Doc,
    /// Build the entire workspace
    Build,
    /// Compile the built-in programs and any WGSL files given
    Shaders {
        /// Extra WGSL files, each holding both vs_main and fs_main
        files: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check => {
            run_fmt()?;
            run_clippy()?;
            run_tests()?;
            run_shaders(&[])?;
            run_doc()?;
        }
        Commands::Fmt => run_fmt()?,
        Commands::Clippy => run_clippy()?,
        Commands::Test => run_tests()?,
        Commands::Deny => run_deny()?,
        Commands::Doc => run_doc()?,
        Commands::Build => run_build()?,
        Commands::Shaders { files } => run_shaders(&files)?,
    }

    Ok(())
}

/// Run `cargo <args>` from the workspace root and fail on a non-zero exit.
fn cargo(step: &str, args: &[&str]) -> Result<()> {
    println!("==> Running cargo {step}");
    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("spawning cargo {step}"))?;
    if !status.success() {
        anyhow::bail!("cargo {step} failed ({status})");
    }
    Ok(())
}

fn run_fmt() -> Result<()> {
    cargo("fmt", &["fmt", "--all", "--", "--check"])
}

fn run_clippy() -> Result<()> {
    cargo(
        "clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
    )
}

fn run_tests() -> Result<()> {
    cargo("test", &["test", "--workspace"])
}

fn run_deny() -> Result<()> {
    cargo("deny", &["deny", "check", "licenses", "bans", "sources"])
}

fn run_doc() -> Result<()> {
    cargo("doc", &["doc", "--workspace", "--no-deps"])
}

fn run_build() -> Result<()> {
    cargo("build", &["build", "--workspace"])
}

fn run_shaders(files: &[PathBuf]) -> Result<()> {
    println!("==> Compiling shader programs");
    let mut sources = shaders::builtins();
    for path in files {
        let wgsl = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let label = path.display().to_string();
        sources.push(lumen_gpu::ProgramSource::new(label, wgsl.clone(), wgsl));
    }

    let mut failed = 0;
    for source in &sources {
        match compile_program(source) {
            Ok(program) => println!(
                "  ok   {} ({} inputs, {} uniform blocks)",
                source.label,
                program.inputs.len(),
                program.uniform_blocks.len()
            ),
            Err(e) => {
                println!("  FAIL {}: {e}", source.label);
                failed += 1;
            }
        }
    }
    if failed > 0 {
        anyhow::bail!("{failed} shader program(s) failed to compile");
    }
    Ok(())
}

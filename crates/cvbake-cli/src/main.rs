//! cvbake command-line interface.
//!
//! Commands:
//! - `build`: render Dockerfiles for every version in the manifest and run
//!   the container builds, streaming output to per-tag log files
//! - `generate`: render the Dockerfiles without building anything
//! - `tags`: list the image tags the manifest expands to
//! - `init`: write a starter manifest with the default build matrix

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use cvbake_core::{init_tracing, BakePipeline, BatchReport, BuildRunner, Manifest};

/// Manifest file consulted when `--manifest` is not given.
const DEFAULT_MANIFEST: &str = "cvbake.toml";

#[derive(Parser)]
#[command(name = "cvbake")]
#[command(author = "cvbake contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch OpenCV/CUDA Docker image builder", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render Dockerfiles and build every version in the manifest
    Build {
        /// Path to the build manifest
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Directory for rendered Dockerfiles
        #[arg(long, default_value = "dockerfiles")]
        dockerfiles_dir: PathBuf,

        /// Directory for per-tag build logs
        #[arg(long, default_value = "logs")]
        logs_dir: PathBuf,

        /// Build context passed to the container tool
        #[arg(long, default_value = ".")]
        context: PathBuf,

        /// Number of builds to run concurrently
        #[arg(short, long, default_value = "1")]
        jobs: usize,

        /// Per-build timeout in seconds (0 disables the timeout)
        #[arg(long, default_value = "0")]
        timeout_secs: u64,

        /// Container build program to invoke
        #[arg(long, env = "CVBAKE_PROGRAM", default_value = "docker")]
        program: String,

        /// Write a JSON batch report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Render Dockerfiles for every version without building
    Generate {
        /// Path to the build manifest
        #[arg(short, long)]
        manifest: Option<PathBuf>,

        /// Directory for rendered Dockerfiles
        #[arg(long, default_value = "dockerfiles")]
        dockerfiles_dir: PathBuf,
    },

    /// List the image tags the manifest expands to
    Tags {
        /// Path to the build manifest
        #[arg(short, long)]
        manifest: Option<PathBuf>,
    },

    /// Write a starter manifest with the default build matrix
    Init {
        /// Where to write the manifest
        #[arg(default_value = DEFAULT_MANIFEST)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.json, cli.verbose);

    match cli.command {
        Commands::Build {
            manifest,
            dockerfiles_dir,
            logs_dir,
            context,
            jobs,
            timeout_secs,
            program,
            report,
        } => {
            cmd_build(
                manifest.as_deref(),
                dockerfiles_dir,
                logs_dir,
                context,
                jobs,
                timeout_secs,
                program,
                report.as_deref(),
            )
            .await
        }
        Commands::Generate {
            manifest,
            dockerfiles_dir,
        } => cmd_generate(manifest.as_deref(), &dockerfiles_dir),
        Commands::Tags { manifest } => cmd_tags(manifest.as_deref()),
        Commands::Init { path, force } => cmd_init(&path, force),
    }
}

/// Load the manifest for a command.
///
/// An explicit `--manifest` path must exist. Without one, `cvbake.toml` in
/// the working directory is used if present, otherwise the built-in default
/// matrix.
fn load_manifest(path: Option<&Path>) -> Result<Manifest> {
    match path {
        Some(path) => {
            Manifest::load(path).with_context(|| format!("load manifest {}", path.display()))
        }
        None => {
            let default = Path::new(DEFAULT_MANIFEST);
            if default.exists() {
                Manifest::load(default).context("load manifest cvbake.toml")
            } else {
                info!("no manifest file found, using the built-in build matrix");
                Ok(Manifest::default())
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_build(
    manifest_path: Option<&Path>,
    dockerfiles_dir: PathBuf,
    logs_dir: PathBuf,
    context: PathBuf,
    jobs: usize,
    timeout_secs: u64,
    program: String,
    report_path: Option<&Path>,
) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;

    println!(
        "Building {} versions of {}",
        manifest.versions.len(),
        manifest.image
    );
    println!(
        "Base: nvidia/cuda:{}-cudnn7-devel-{}",
        manifest.cuda, manifest.os
    );
    println!();

    let pipeline = BakePipeline {
        dockerfiles_dir,
        logs_dir,
        jobs: jobs.max(1),
        runner: BuildRunner {
            program,
            context,
            timeout_secs,
        },
    };

    let result = pipeline
        .run(&manifest)
        .await
        .context("batch failed to run")?;

    println!("Run ID: {}", result.run_id);
    println!("Status: {}", if result.success { "✓ PASSED" } else { "✗ FAILED" });
    println!("Duration: {}ms", result.duration_ms);
    println!();

    for outcome in &result.outcomes {
        let status = if outcome.passed() { "✓" } else { "✗" };
        println!(
            "  {} {} ({}ms, exit code: {})",
            status, outcome.tag, outcome.duration_ms, outcome.exit_code
        );
    }

    println!();
    println!("Summary: {}/{} builds passed", result.passed_count(), result.outcomes.len());

    for outcome in result.outcomes.iter().filter(|o| !o.passed()) {
        match &outcome.error {
            Some(error) => eprintln!("build {} did not run: {}", outcome.tag, error),
            None => eprintln!(
                "build {} failed with exit code {} (log: {})",
                outcome.tag,
                outcome.exit_code,
                outcome.log_path.display()
            ),
        }
    }

    if let Some(path) = report_path {
        let report = BatchReport::from_result(&result);
        cvbake_core::write_batch_report_json(path, &report)?;
        println!("Report written to {}", path.display());
    }

    // Failed builds are reported above but do not fail the command; the
    // batch ran to completion.
    Ok(())
}

fn cmd_generate(manifest_path: Option<&Path>, dockerfiles_dir: &Path) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;

    std::fs::create_dir_all(dockerfiles_dir)
        .with_context(|| format!("create {}", dockerfiles_dir.display()))?;

    let pipeline = BakePipeline {
        dockerfiles_dir: dockerfiles_dir.to_path_buf(),
        ..BakePipeline::default()
    };

    for tag in manifest.tags() {
        let path = pipeline.write_definition(&manifest, &tag)?;
        println!("  {}", path.display());
    }

    println!();
    println!(
        "Generated {} Dockerfiles in {}",
        manifest.versions.len(),
        dockerfiles_dir.display()
    );
    Ok(())
}

fn cmd_tags(manifest_path: Option<&Path>) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    for tag in manifest.tags() {
        println!("{}", tag.image_ref());
    }
    Ok(())
}

fn cmd_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let manifest = Manifest::default();
    std::fs::write(path, manifest.to_toml()?)
        .with_context(|| format!("write {}", path.display()))?;

    println!(
        "Wrote {} ({} versions)",
        path.display(),
        manifest.versions.len()
    );
    Ok(())
}

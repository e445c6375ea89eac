//! uv-decimate: command-line seam-aware mesh decimation.
//!
//! Reduces the vertex count of a textured OBJ mesh while preserving its UV
//! parameterization across seams, boundaries, and foldovers.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=uv_decimate=info` - Basic operation logging
//! - `RUST_LOG=uv_decimate=debug` - Detailed progress logging
//! - `RUST_LOG=uv_decimate::timing=debug` - Performance timing
//!
//! # Example
//!
//! ```bash
//! uv-decimate model.obj num-vertices 1000
//! uv-decimate model.obj percent-vertices 25 small.obj --strict 1 --uv-weight 2.0
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use uv_decimate::{DecimateParams, SeamAwareDegree, UvMesh, decimate};

/// uv-decimate - Decimate a textured mesh without breaking its UV atlas.
#[derive(Parser)]
#[command(name = "uv-decimate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input OBJ file
    input: PathBuf,

    #[command(subcommand)]
    command: Commands,

    /// Seam awareness degree: 0 ignores the atlas (it may tear), 1 keeps the
    /// UV shape of seams, 2 keeps seams seamless
    #[arg(long, global = true, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=2))]
    strict: u8,

    /// Prevent boundary edges from being collapsed
    #[arg(long, global = true)]
    preserve_boundaries: bool,

    /// Relative UV error weight
    #[arg(long, global = true, default_value_t = 1.0)]
    uv_weight: f64,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Decimate to exactly N vertices
    NumVertices {
        /// Target vertex count
        count: i64,
        /// Output file path; generated from the input name if omitted
        output: Option<PathBuf>,
    },
    /// Decimate to P% of the input vertex count
    PercentVertices {
        /// Target percentage of input vertices
        percent: f64,
        /// Output file path; generated from the input name if omitted
        output: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct DecimateReport {
    input: String,
    output: String,
    reached_target: bool,
    input_vertices: usize,
    output_vertices: usize,
    collapses_performed: usize,
    max_error: f64,
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "uv_decimate=info",
            2 => "uv_decimate=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

/// `<stem>-<suffix>` next to the input file.
fn derived_output_path(input: &Path, suffix: &str) -> PathBuf {
    let base = input.with_extension("");
    PathBuf::from(format!("{}-{}", base.display(), suffix))
}

fn run(cli: &Cli) -> Result<()> {
    if cli.uv_weight <= 0.0 {
        bail!("--uv-weight must be positive, got {}", cli.uv_weight);
    }
    let degree = SeamAwareDegree::from_level(cli.strict)
        .expect("clap restricts --strict to 0..=2");

    let mesh = UvMesh::load(&cli.input)
        .with_context(|| format!("Failed to load mesh from {:?}", cli.input))?;
    let input_vertices = mesh.vertex_count();
    if !cli.quiet {
        println!(
            "Loaded a mesh with {} vertices and {} faces: {}",
            input_vertices,
            mesh.face_count(),
            cli.input.display()
        );
    }

    let (target, output) = match &cli.command {
        Commands::NumVertices { count, output } => (*count, output.clone()),
        Commands::PercentVertices { percent, output } => {
            let target = (percent * input_vertices as f64 / 100.0).round() as i64;
            if !cli.quiet {
                println!(
                    "{}% of {} input vertices is {} output vertices.",
                    percent, input_vertices, target
                );
            }
            (target, output.clone())
        }
    };
    if target <= 0 {
        bail!("target number of vertices must be a positive integer, got {target}");
    }
    let target = target as usize;

    // A target at or above the input size rewrites the input unchanged.
    if target >= input_vertices {
        let path = output.unwrap_or_else(|| {
            derived_output_path(
                &cli.input,
                &format!("decimated_to_{input_vertices}_vertices.obj"),
            )
        });
        mesh.save(&path)
            .with_context(|| format!("Failed to save mesh to {:?}", path))?;
        if !cli.quiet {
            println!("Wrote: {}", path.display());
            eprintln!(
                "{}: target is not smaller than the input vertex count; mesh written unchanged",
                "Warning".yellow()
            );
        }
        return Ok(());
    }

    let params = DecimateParams {
        target_num_vertices: target,
        seam_aware_degree: degree,
        preserve_boundaries: cli.preserve_boundaries,
        uv_weight: cli.uv_weight,
    };
    let result = decimate(&mesh, &params)
        .with_context(|| format!("Failed to decimate {:?}", cli.input))?;

    if !result.reached_target && !cli.quiet {
        eprintln!(
            "{}: no legal collapse left before reaching the target (wrote the partial result)",
            "Warning".yellow()
        );
    }

    let path = output.unwrap_or_else(|| {
        derived_output_path(
            &cli.input,
            &format!(
                "decimated_to_{}_err_{:.6}.obj",
                result.mesh.vertex_count(),
                result.max_error
            ),
        )
    });
    result
        .mesh
        .save(&path)
        .with_context(|| format!("Failed to save decimated mesh to {:?}", path))?;

    let report = DecimateReport {
        input: cli.input.display().to_string(),
        output: path.display().to_string(),
        reached_target: result.reached_target,
        input_vertices,
        output_vertices: result.mesh.vertex_count(),
        collapses_performed: result.collapses_performed,
        max_error: result.max_error,
    };

    match cli.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!(
                    "{}",
                    format!("Decimated mesh saved to {}", report.output).green()
                );
                println!(
                    "  {}: {} → {} vertices",
                    "Vertices".cyan(),
                    report.input_vertices,
                    report.output_vertices
                );
                println!(
                    "  {}: {} edge collapses",
                    "Operations".cyan(),
                    report.collapses_performed
                );
                println!("  {}: {:.6}", "Max error".cyan(), report.max_error);
            }
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {}: {}", "Caused by".yellow(), cause);
        }
        std::process::exit(1);
    }
}

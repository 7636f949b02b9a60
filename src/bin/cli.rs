// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Meshgeom CLI

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use meshgeom::io::{self, ExportFormat};
use meshgeom::{builtin_registry, Mesh, MeshingParameters, NetgenGeometry, PipelineStage};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "meshgeom")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Surface meshing on exact geometry", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Mesh a geometry file
    Mesh {
        /// Geometry file
        input: PathBuf,

        /// Meshing parameters (TOML); defaults to meshing.toml plus environment
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format (json, stl, mesh); guessed from the output extension
        #[arg(short, long)]
        format: Option<String>,

        /// Uniform refinement passes after meshing
        #[arg(short, long, default_value = "0")]
        refine: usize,

        /// Override the global maximum mesh size
        #[arg(long)]
        max_h: Option<f64>,
    },

    /// Show geometry topology
    Info {
        /// Geometry file
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Mesh {
            input,
            config,
            output,
            format,
            refine,
            max_h,
        } => mesh_command(&input, config.as_deref(), output.as_deref(), format.as_deref(), refine, max_h),
        Commands::Info { input } => info_command(&input),
    }
}

fn load_geometry(input: &Path) -> Result<Box<dyn NetgenGeometry>> {
    if !input.exists() {
        bail!("Input file not found: {}", input.display());
    }
    builtin_registry()
        .load(input)
        .with_context(|| format!("Failed to load {}", input.display()))
}

fn mesh_command(
    input: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
    format: Option<&str>,
    refine: usize,
    max_h: Option<f64>,
) -> Result<()> {
    let mut mparam = match config {
        Some(path) => MeshingParameters::from_file(path)?,
        None => MeshingParameters::load()?,
    };
    if let Some(max_h) = max_h {
        mparam = mparam.with_max_h(max_h);
        mparam.validate()?;
    }

    let geo = load_geometry(input)?;
    let start = Instant::now();

    let stages: Vec<PipelineStage> =
        PipelineStage::range(mparam.perf_steps_start, mparam.perf_steps_end).collect();
    let pb = ProgressBar::new(stages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );

    let mut mesh = Mesh::new();
    for stage in stages {
        pb.set_message(stage.as_str());
        geo.run_stage(&mut mesh, &mparam, stage)
            .with_context(|| format!("Stage {} failed", stage.as_str()))?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    for _ in 0..refine {
        geo.refinement().refine_uniform(&*geo, &mut mesh)?;
    }
    let elapsed = start.elapsed();

    println!("{} {}", "Meshed".green().bold(), input.display().to_string().cyan());
    println!("  {} {}", "Points:".bright_black(), mesh.point_count());
    println!("  {} {}", "Segments:".bright_black(), mesh.segment_count());
    println!("  {} {}", "Elements:".bright_black(), mesh.surface_element_count());
    println!("  {} {:.6}", "Area:".bright_black(), mesh.surface_area());
    println!("  {} {:.2?}", "Time:".bright_black(), elapsed);

    if let Some(output) = output {
        match format.unwrap_or_else(|| extension(output)) {
            "mesh" => io::save_mesh(&mesh, Some(&*geo), output)?,
            other => {
                let format = ExportFormat::from_name(other)
                    .with_context(|| format!("Unsupported format: {other} (json, stl, mesh)"))?;
                io::export(&mesh, output, format)?;
            }
        }
        println!("  {} {}", "Output:".bright_black(), output.display());
    }

    Ok(())
}

fn extension(path: &Path) -> &str {
    path.extension().and_then(|e| e.to_str()).unwrap_or("json")
}

fn info_command(input: &Path) -> Result<()> {
    let geo = load_geometry(input)?;
    let bbox = geo.bounding_box();

    println!("{} {}", "Geometry:".bold(), input.display().to_string().cyan());
    println!("  {} {:?}", "Type:".bright_black(), geo.geom_type());
    println!("  {} {}", "Vertices:".bright_black(), geo.vertices().len());
    println!("  {} {}", "Edges:".bright_black(), geo.edges().len());
    println!("  {} {}", "Faces:".bright_black(), geo.faces().len());
    println!(
        "  {} [{:.4}, {:.4}, {:.4}] - [{:.4}, {:.4}, {:.4}]",
        "Bounds:".bright_black(),
        bbox.min.x,
        bbox.min.y,
        bbox.min.z,
        bbox.max.x,
        bbox.max.y,
        bbox.max.z
    );

    for (i, face) in geo.faces().iter().enumerate() {
        let length: f64 = face.boundary(0).iter().map(|e| e.length()).sum();
        println!(
            "  {} {:<10} {} loop(s), perimeter {:.4}",
            format!("#{i}").bright_black(),
            face.name(),
            face.n_boundaries(),
            length
        );
    }

    Ok(())
}

//! depth-quality CLI: score depth-camera captures against reference fixtures.

use clap::{ArgAction, Args, Parser, Subcommand};
use depth_quality::evaluate::{evaluate_with_reference, load_reference};
use depth_quality::{EvaluateConfig, FixtureSpec, QualityReport, ReferenceMesh};
use log::LevelFilter;
use std::path::PathBuf;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "depth-quality")]
#[command(about = "Score depth-camera accuracy against machined reference fixtures")]
#[command(version)]
struct Cli {
    /// More log output (repeatable).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log through a `tracing` subscriber (filter from RUST_LOG).
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    tracing: bool,

    /// Emit tracing output as JSON lines.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true, requires = "tracing")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align, clip and score one capture described by a JSON config.
    Evaluate(EvaluateArgs),

    /// Segment a reference mesh and print its parts.
    Inspect(InspectArgs),
}

#[derive(Debug, Clone, Args)]
struct EvaluateArgs {
    /// Path to the evaluation config (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Report path; overrides `output_path` from the config.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write the aligned and cropped clouds next to the input cloud.
    #[arg(long)]
    save_debug_clouds: bool,
}

#[derive(Debug, Clone, Args)]
struct InspectArgs {
    /// Reference mesh (OBJ).
    #[arg(long)]
    mesh: PathBuf,

    /// Backplate thickness in fixture units.
    #[arg(long)]
    backplate_thickness: Option<f64>,

    /// Pattern-plate thickness in fixture units.
    #[arg(long)]
    pattern_plate_thickness: Option<f64>,

    /// Tolerance for matching plate extents.
    #[arg(long)]
    tolerance: Option<f64>,
}

fn init_logging(cli: &Cli) -> CliResult<()> {
    #[cfg(feature = "tracing")]
    if cli.tracing {
        let _ = tracing_log::LogTracer::init();
        if !depth_quality::core::init_tracing(cli.json_logs) {
            log::warn!("a tracing subscriber was already installed");
        }
        return Ok(());
    }

    let level = if cli.quiet {
        LevelFilter::Error
    } else {
        match cli.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    depth_quality::core::init_with_level(level)?;
    Ok(())
}

fn run_evaluate(args: &EvaluateArgs) -> CliResult<()> {
    let mut cfg = EvaluateConfig::load_json(&args.config)?;
    if args.save_debug_clouds {
        cfg.save_debug_clouds = true;
    }
    let out = args.out.clone().unwrap_or_else(|| cfg.output_path());

    let result = load_reference(&cfg).and_then(|reference| evaluate_with_reference(&cfg, &reference));
    match result {
        Ok(report) => {
            report.write_json(&out)?;
            if let Some(score) = report.score {
                println!("rmse    {:.4}", score.rmse);
                println!("density {:.4}", score.density);
            }
            log::info!("wrote report to {}", out.display());
            Ok(())
        }
        Err(err) => {
            let mut report = QualityReport::new(&cfg);
            report.error = Some(err.to_string());
            report.write_json(&out)?;
            log::error!("evaluation failed, report written to {}", out.display());
            Err(err.into())
        }
    }
}

fn run_inspect(args: &InspectArgs) -> CliResult<()> {
    let mut spec = FixtureSpec::default();
    if let Some(t) = args.backplate_thickness {
        spec.backplate_thickness = t;
    }
    if let Some(t) = args.pattern_plate_thickness {
        spec.pattern_plate_thickness = t;
    }
    if let Some(t) = args.tolerance {
        spec.classification_tolerance = t;
    }
    let reference = ReferenceMesh::load(&args.mesh, spec)?;
    println!("{}", serde_json::to_string_pretty(&reference.summary())?);
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    match &cli.command {
        Commands::Evaluate(args) => run_evaluate(args),
        Commands::Inspect(args) => run_inspect(args),
    }
}

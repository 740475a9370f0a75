//! marker-follow CLI: replay scripted sessions and print the settings schema.

use clap::{Args, Parser, Subcommand};
use marker_follow::replay::{replay_file, Scenario};
use marker_follow::{init_logging, level_from_name, settings_schema};
use std::path::{Path, PathBuf};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "marker-follow")]
#[command(about = "Drive a scene element from a tracked fiducial marker")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario against the in-memory scene and report placements.
    Replay(ReplayArgs),

    /// Print the settings schema for a scenario's scene as JSON.
    Schema {
        /// Path to the scenario JSON.
        scenario: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Path to the scenario JSON.
    scenario: PathBuf,

    /// Write the report here instead of stdout.
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON (needs the `tracing` feature).
    #[arg(long)]
    json_logs: bool,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Replay(args) => run_replay(&args),
        Commands::Schema { scenario } => run_schema(&scenario),
    }
}

fn run_replay(args: &ReplayArgs) -> CliResult<()> {
    init_logging(level_from_name(&args.log_level), args.json_logs)?;

    let report = replay_file(&args.scenario)?;
    match &args.out {
        Some(path) => {
            report.write_json(path)?;
            log::info!("wrote replay report to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn run_schema(path: &Path) -> CliResult<()> {
    let scenario = Scenario::load_json(path)?;
    let host = scenario.build_host();
    let schema = settings_schema(&*host);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

//! Command-line entry point: loads a run manifest, applies flag overrides,
//! partitions the network across the configured process count, and runs
//! every process's [`Rank`] to completion on its own thread.

use clap::Parser;
use outbreak_cli::config::RunManifest;
use outbreak_cli::error::Result;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Runs a configured contagion simulation to completion.
#[derive(Parser, Debug)]
#[command(name = "outbreak", author, version, about, long_about = None)]
struct Cli {
    /// Path to the run manifest JSON document.
    #[arg(long)]
    config: PathBuf,

    /// Overrides the manifest's start tick.
    #[arg(long)]
    start_tick: Option<u64>,

    /// Overrides the manifest's end tick.
    #[arg(long)]
    end_tick: Option<u64>,

    /// Overrides the manifest's master seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Overrides the manifest's per-change-event CSV output path.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Overrides the manifest's per-tick summary CSV path.
    #[arg(long = "summary-output")]
    summary_output: Option<PathBuf>,

    /// Overrides the manifest's simulated process count.
    #[arg(long)]
    processes: Option<usize>,

    /// Overrides the manifest's worker-thread count per process.
    #[arg(long)]
    threads: Option<usize>,

    /// Raises the log filter; repeat for more detail (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli) {
        tracing::error!(%err, "run failed");
        anyhow::bail!(err);
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let default_filter = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut manifest = RunManifest::load(&cli.config)?;
    if let Some(v) = cli.start_tick {
        manifest.start_tick = v;
    }
    if let Some(v) = cli.end_tick {
        manifest.end_tick = v;
    }
    if let Some(v) = cli.seed {
        manifest.seed = v;
    }
    if let Some(v) = cli.output {
        manifest.output = v;
    }
    if let Some(v) = cli.summary_output {
        manifest.summary_output = v;
    }
    if let Some(v) = cli.processes {
        manifest.processes = v.max(1);
    }
    if let Some(v) = cli.threads {
        manifest.threads_per_process = v.max(1);
    }
    outbreak_cli::run(&manifest)
}

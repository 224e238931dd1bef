//! nuana CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod io;
mod replay;
mod select;

#[derive(Parser)]
#[command(name = "nuana")]
#[command(about = "nuana - CC ν_μ p π⁰ event selection and cut statistics")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the online selector over events (JSON Lines) and write records
    Select {
        /// Input events, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Output records (JSON Lines). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Analysis config (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Threads (0 = auto).
        #[arg(long, default_value = "0")]
        threads: usize,

        /// Stop after this many events (overrides the config).
        #[arg(long)]
        max_events: Option<u64>,
    },

    /// Replay persisted records and report per-gate efficiency and purity
    Replay {
        /// Input records, one JSON object per line
        #[arg(short, long)]
        input: PathBuf,

        /// Analysis config (YAML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output report. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write the report as a fixed-width table instead of JSON
        #[arg(long)]
        text: bool,

        /// Write cut histograms (JSON) here
        #[arg(long)]
        histograms: Option<PathBuf>,

        /// Threads (0 = auto). Use 1 for a sequential replay.
        #[arg(long, default_value = "0")]
        threads: usize,
    },

    /// Print the default analysis config (YAML)
    Config {
        /// Output file. Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    match cli.command {
        Commands::Select { input, output, config, threads, max_events } => {
            setup_threads(threads);
            let cfg = config::read_config(config.as_deref())?;
            select::cmd_select(&input, output.as_ref(), cfg, max_events)
        }
        Commands::Replay { input, config, output, text, histograms, threads } => {
            setup_threads(threads);
            let cfg = config::read_config(config.as_deref())?;
            replay::cmd_replay(&input, output.as_ref(), histograms.as_ref(), text, cfg, threads)
        }
        Commands::Config { output } => cmd_config(output.as_ref()),
    }
}

fn setup_threads(threads: usize) {
    if threads > 0 {
        // Best-effort; if a global pool already exists, keep going.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(threads).build_global();
    }
}

fn cmd_config(output: Option<&PathBuf>) -> Result<()> {
    let text = serde_yaml_ng::to_string(&config::AnalysisConfig::default())?;
    match output {
        Some(path) => std::fs::write(path, text)?,
        None => print!("{text}"),
    }
    Ok(())
}

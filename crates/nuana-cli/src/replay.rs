//! `nuana replay`: cut statistics from persisted records.

use anyhow::{Context, Result};
use nuana_core::EventRecord;
use nuana_cuts::Replayer;
use std::path::PathBuf;

use crate::config::AnalysisConfig;
use crate::io::{read_jsonl, write_json};

pub fn cmd_replay(
    input: &PathBuf,
    output: Option<&PathBuf>,
    histograms: Option<&PathBuf>,
    text: bool,
    config: AnalysisConfig,
    threads: usize,
) -> Result<()> {
    let mut replayer = Replayer::new(config.replay)?;

    tracing::info!(path = %input.display(), "reading records");
    let records: Vec<EventRecord> = read_jsonl(input, config.max_events)?;

    let result = if threads == 1 { replayer.replay(&records) } else { replayer.replay_parallel(&records) };
    let passed = result.with_context(|| format!("replay of {} failed", input.display()))?;
    tracing::info!(records = records.len(), passed, "replay complete");

    let report = replayer.report();
    if text {
        match output {
            Some(path) => std::fs::write(path, report.to_string())
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => print!("{report}"),
        }
    } else {
        write_json(output, serde_json::to_value(&report)?)?;
    }

    if let Some(path) = histograms {
        write_json(Some(path), serde_json::to_value(replayer.histograms())?)?;
        tracing::info!(path = %path.display(), "histograms written");
    }
    Ok(())
}

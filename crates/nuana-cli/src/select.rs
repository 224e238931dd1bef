//! `nuana select`: run the online selector over events.

use anyhow::Result;
use nuana_core::{Event, EventRecord, SelectionOutcome};
use nuana_reco::EventSelector;
use rayon::prelude::*;
use std::path::PathBuf;

use crate::config::AnalysisConfig;
use crate::io::{read_jsonl, write_jsonl};

pub fn cmd_select(
    input: &PathBuf,
    output: Option<&PathBuf>,
    config: AnalysisConfig,
    max_events: Option<u64>,
) -> Result<()> {
    let limit = max_events.or(config.max_events);
    let store_all = config.selector.store_all_events;
    let selector = EventSelector::with_reference_tools(config.selector)?;

    tracing::info!(path = %input.display(), "reading events");
    let mut events: Vec<Event> = read_jsonl(input, limit)?;
    for (i, ev) in events.iter_mut().enumerate() {
        ev.entry.get_or_insert(i as u64);
    }

    // Order-preserving: records line up with input events.
    let records: Vec<EventRecord> = events.par_iter().map(|ev| selector.select(ev)).collect();

    let (mut passed, mut failed, mut refused) = (0u64, 0u64, 0u64);
    for rec in &records {
        match rec.outcome {
            SelectionOutcome::Passed => passed += 1,
            SelectionOutcome::Failed { .. } => failed += 1,
            SelectionOutcome::Refused { .. } => refused += 1,
        }
    }
    tracing::info!(events = records.len(), passed, failed, refused, "selection complete");

    let kept = records.iter().filter(|r| store_all || r.outcome.passed());
    write_jsonl(output, kept)
}

//! Cut tables: events surviving each gate, signal efficiency and purity.

use std::collections::BTreeMap;
use std::fmt;

use nuana_core::Gate;
use serde::Serialize;

use crate::ledger::Topology;

/// One gate's line in a cut table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    /// Gate.
    pub gate: Gate,
    /// Events surviving the gate.
    pub events: u64,
    /// Signal events surviving the gate.
    pub signal: u64,
    /// Events that reached the gate and failed it.
    pub rejected: u64,
    /// Signal efficiency against the first baseline (%).
    pub eff_first: Option<f64>,
    /// Signal efficiency against the second baseline (%).
    pub eff_second: Option<f64>,
    /// Signal purity (%).
    pub purity: Option<f64>,
}

/// Rows of one topology.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportTable {
    /// Topology.
    pub topology: Topology,
    /// Gates whose signal counts are the efficiency denominators.
    pub baselines: [Gate; 2],
    /// Rows in gate order.
    pub rows: Vec<ReportRow>,
}

impl ReportTable {
    /// Row of `gate`.
    pub fn row(&self, gate: Gate) -> &ReportRow {
        &self.rows[gate.index()]
    }
}

/// Full cut report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutReport {
    /// One table per topology.
    pub tables: Vec<ReportTable>,
    /// Events refused online, by kind.
    pub refusals: BTreeMap<String, u64>,
}

impl CutReport {
    /// Table of `topology`.
    pub fn table(&self, topology: Topology) -> Option<&ReportTable> {
        self.tables.iter().find(|t| t.topology == topology)
    }
}

const NAME_WIDTH: usize = 35;
const COL_WIDTH: usize = 12;

fn pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "N/A".to_string(),
    }
}

impl fmt::Display for ReportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} events", self.topology.name())?;
        write!(f, "{:<NAME_WIDTH$} ", "Cut")?;
        let first = format!("Eff({})", self.baselines[0].name());
        let second = format!("Eff({})", self.baselines[1].name());
        for title in ["N(Events)", "N(Signal)", first.as_str(), second.as_str(), "Purity"] {
            write!(f, "{title:<COL_WIDTH$} ")?;
        }
        writeln!(f)?;
        for row in &self.rows {
            writeln!(
                f,
                "{:<NAME_WIDTH$} {:<COL_WIDTH$} {:<COL_WIDTH$} {:<COL_WIDTH$} {:<COL_WIDTH$} {:<COL_WIDTH$}",
                row.gate.name(),
                row.events,
                row.signal,
                pct(row.eff_first),
                pct(row.eff_second),
                pct(row.purity),
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for CutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, table) in self.tables.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{table}")?;
        }
        if !self.refusals.is_empty() {
            writeln!(f)?;
            writeln!(f, "Refused events")?;
            for (kind, n) in &self.refusals {
                writeln!(f, "{kind:<NAME_WIDTH$} {n}")?;
            }
        }
        Ok(())
    }
}

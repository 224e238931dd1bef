//! Ordered per-gate counters, replicated per topology.
//!
//! Gate outcomes must arrive in pipeline order, one event at a time, starting
//! at [`Gate::All`] and stopping after the first failure. The ledger enforces
//! this and reports violations as [`Error::Validation`].

use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::sync::Arc;

use nuana_core::record::EventRecord;
use nuana_core::truth::{TruthCategory, TruthLabel};
use nuana_core::{Error, Gate, Result};
use serde::{Deserialize, Serialize};

use crate::counter::CutCounter;
use crate::report::{CutReport, ReportRow, ReportTable};

/// Final-state topology table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topology {
    /// Every event.
    All,
    /// Exactly one prong (the muon).
    OneTrack,
    /// Two or more prongs.
    TwoTrack,
}

impl Topology {
    /// Every table, in report order.
    pub const ALL: [Topology; 3] = [Topology::All, Topology::OneTrack, Topology::TwoTrack];

    /// Slot in ledger arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Report label.
    pub fn name(self) -> &'static str {
        match self {
            Topology::All => "All",
            Topology::OneTrack => "1Track",
            Topology::TwoTrack => "2Track",
        }
    }
}

/// Truth label of a persisted record.
pub trait TruthResolver: Send + Sync {
    /// Category and study flags of `record`.
    fn resolve(&self, record: &EventRecord) -> TruthLabel;
}

/// Which topology table a record belongs to, besides [`Topology::All`].
pub trait TopologyPartition: Send + Sync {
    /// `None` keeps the record in the `All` table only.
    fn partition(&self, record: &EventRecord) -> Option<Topology>;
}

/// Source of a study flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyFlag {
    /// Never set.
    #[default]
    Off,
    /// Background event with a true Michel electron.
    BackgroundWithMichel,
    /// Any event with a true Michel electron.
    TrueMichel,
}

/// Reads the truth block written by the selector.
#[derive(Debug, Clone, Copy)]
pub struct RecordTruth {
    /// First study flag.
    pub study1: StudyFlag,
    /// Second study flag.
    pub study2: StudyFlag,
}

impl Default for RecordTruth {
    fn default() -> Self {
        Self { study1: StudyFlag::Off, study2: StudyFlag::BackgroundWithMichel }
    }
}

impl RecordTruth {
    fn study(flag: StudyFlag, record: &EventRecord) -> bool {
        let Some(truth) = record.truth.as_ref() else { return false };
        match flag {
            StudyFlag::Off => false,
            StudyFlag::BackgroundWithMichel => truth.is_bckg_with_michel,
            StudyFlag::TrueMichel => truth.info.has_michel,
        }
    }
}

impl TruthResolver for RecordTruth {
    fn resolve(&self, record: &EventRecord) -> TruthLabel {
        let category = record.truth.as_ref().map_or(TruthCategory::Data, |t| t.category);
        TruthLabel::new(category)
            .with_studies(Self::study(self.study1, record), Self::study(self.study2, record))
    }
}

/// 1 prong → one-track table, 2+ → two-track table, 0 → `All` only.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProngCount;

impl TopologyPartition for ProngCount {
    fn partition(&self, record: &EventRecord) -> Option<Topology> {
        match record.n_prongs {
            0 => None,
            1 => Some(Topology::OneTrack),
            _ => Some(Topology::TwoTrack),
        }
    }
}

/// One counter per gate for one topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CutTable {
    /// Topology counted.
    pub topology: Topology,
    /// Counters in gate order.
    pub counters: Vec<CutCounter>,
}

impl CutTable {
    /// Empty table.
    pub fn new(topology: Topology) -> Self {
        Self { topology, counters: Gate::SEQUENCE.iter().map(|&g| CutCounter::new(g)).collect() }
    }

    /// Counter of `gate`.
    pub fn counter(&self, gate: Gate) -> &CutCounter {
        &self.counters[gate.index()]
    }

    /// Totals never increase along the pipeline.
    pub fn is_monotonic(&self) -> bool {
        self.counters.windows(2).all(|w| w[0].total >= w[1].total)
    }

    /// Every counter's sub-counts add up.
    pub fn is_consistent(&self) -> bool {
        self.counters.iter().all(CutCounter::is_consistent)
    }
}

/// State of the event currently being recorded.
#[derive(Debug, Clone, Copy)]
struct Cursor {
    label: TruthLabel,
    topology: Option<Topology>,
    last: Option<Gate>,
    stopped: bool,
}

/// Counters for every gate in three topology tables.
#[derive(Clone)]
pub struct CutLedger {
    resolver: Arc<dyn TruthResolver>,
    partition: Arc<dyn TopologyPartition>,
    tables: Vec<CutTable>,
    refusals: BTreeMap<String, u64>,
    baselines: [Gate; 2],
    cursor: Option<Cursor>,
}

impl CutLedger {
    /// Empty ledger. Baselines default to `All` and `Muon_None`.
    pub fn new(resolver: Arc<dyn TruthResolver>, partition: Arc<dyn TopologyPartition>) -> Self {
        Self {
            resolver,
            partition,
            tables: Topology::ALL.iter().map(|&t| CutTable::new(t)).collect(),
            refusals: BTreeMap::new(),
            baselines: [Gate::All, Gate::MuonNone],
            cursor: None,
        }
    }

    /// Ledger reading truth from records and splitting by prong count.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(RecordTruth::default()), Arc::new(ProngCount))
    }

    /// Select the two efficiency baselines.
    pub fn baselines(mut self, first: Gate, second: Gate) -> Self {
        self.baselines = [first, second];
        self
    }

    /// Empty ledger sharing resolver, partition and baselines.
    pub fn fork(&self) -> Self {
        Self::new(Arc::clone(&self.resolver), Arc::clone(&self.partition))
            .baselines(self.baselines[0], self.baselines[1])
    }

    /// Truth label and topology the ledger assigns to `record`.
    pub fn classify(&self, record: &EventRecord) -> (TruthLabel, Option<Topology>) {
        (self.resolver.resolve(record), self.partition.partition(record))
    }

    /// Start counting `record`. Recording [`Gate::All`] does this implicitly.
    pub fn begin_event(&mut self, record: &EventRecord) {
        let (label, topology) = self.classify(record);
        self.cursor = Some(Cursor { label, topology, last: None, stopped: false });
    }

    /// Close the in-flight event.
    pub fn finish_event(&mut self) {
        self.cursor = None;
    }

    /// Record that `record` reached `gate` and survived it or not.
    pub fn record_gate_outcome(&mut self, gate: Gate, survived: bool, record: &EventRecord) -> Result<()> {
        if gate == Gate::All {
            self.begin_event(record);
        }
        let cursor = self
            .cursor
            .as_mut()
            .ok_or_else(|| Error::Validation(format!("{gate} recorded outside an event")))?;
        if let Some(last) = cursor.last {
            if cursor.stopped {
                return Err(Error::Validation(format!("{gate} recorded after the event failed {last}")));
            }
            if gate <= last {
                return Err(Error::Validation(format!("{gate} recorded out of order (after {last})")));
            }
        } else if gate != Gate::All {
            return Err(Error::Validation(format!("{gate} recorded before All")));
        }
        cursor.last = Some(gate);
        cursor.stopped = !survived;

        let label = cursor.label;
        let targets = std::iter::once(Topology::All).chain(cursor.topology);
        for topology in targets {
            let counter = &mut self.tables[topology.index()].counters[gate.index()];
            if survived {
                counter.increment(&label);
            } else {
                counter.reject();
            }
        }
        Ok(())
    }

    /// Count an event refused online. Refusals are not gate outcomes.
    pub fn record_refusal(&mut self, label: &str) {
        *self.refusals.entry(label.to_string()).or_insert(0) += 1;
        self.cursor = None;
    }

    /// Table of one topology.
    pub fn table(&self, topology: Topology) -> &CutTable {
        &self.tables[topology.index()]
    }

    /// Counter of one gate in one topology.
    pub fn counter(&self, topology: Topology, gate: Gate) -> &CutCounter {
        self.table(topology).counter(gate)
    }

    /// Refusal tallies by kind.
    pub fn refusals(&self) -> &BTreeMap<String, u64> {
        &self.refusals
    }

    /// Efficiency/purity table for every topology.
    pub fn write_report(&self) -> CutReport {
        let tables = self
            .tables
            .iter()
            .map(|table| {
                let first = table.counter(self.baselines[0]);
                let second = table.counter(self.baselines[1]);
                let rows = table
                    .counters
                    .iter()
                    .map(|c| ReportRow {
                        gate: c.gate,
                        events: c.total,
                        signal: c.signal,
                        rejected: c.rejected,
                        eff_first: c.efficiency(first),
                        eff_second: c.efficiency(second),
                        purity: c.purity(),
                    })
                    .collect();
                ReportTable { topology: table.topology, baselines: self.baselines, rows }
            })
            .collect();
        CutReport { tables, refusals: self.refusals.clone() }
    }
}

impl AddAssign<CutLedger> for CutLedger {
    fn add_assign(&mut self, rhs: CutLedger) {
        for (mine, theirs) in self.tables.iter_mut().zip(&rhs.tables) {
            for (a, b) in mine.counters.iter_mut().zip(&theirs.counters) {
                *a += b;
            }
        }
        for (kind, n) in rhs.refusals {
            *self.refusals.entry(kind).or_insert(0) += n;
        }
    }
}

impl std::fmt::Debug for CutLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CutLedger")
            .field("tables", &self.tables)
            .field("refusals", &self.refusals)
            .field("baselines", &self.baselines)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CutLedger {
    fn eq(&self, other: &Self) -> bool {
        self.tables == other.tables && self.refusals == other.refusals && self.baselines == other.baselines
    }
}

//! # nuana-cuts
//!
//! Offline half of the pipeline: per-gate [`CutCounter`]s, the ordered
//! [`CutLedger`] that keeps them per topology, the [`Replayer`] that re-derives
//! gate outcomes from persisted records, and the resulting [`CutReport`] and
//! [`CutHistograms`].
//!
//! ```no_run
//! use nuana_cuts::{ReplayConfig, Replayer};
//!
//! let records: Vec<nuana_core::EventRecord> = Vec::new();
//! let mut replayer = Replayer::new(ReplayConfig::default())?;
//! replayer.replay(&records)?;
//! println!("{}", replayer.report());
//! # Ok::<(), nuana_core::Error>(())
//! ```

#![warn(missing_docs)]

pub mod counter;
pub mod histogram;
pub mod ledger;
pub mod replay;
pub mod report;

pub use counter::{CutCounter, percentage};
pub use histogram::{CutHistogram, CutHistograms, CutVariable, OutOfRange, Slice};
pub use ledger::{
    CutLedger, CutTable, ProngCount, RecordTruth, StudyFlag, Topology, TopologyPartition,
    TruthResolver,
};
pub use replay::{ReplayConfig, Replayer};
pub use report::{CutReport, ReportRow, ReportTable};

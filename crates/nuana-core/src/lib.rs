//! # nuana-core
//!
//! Data model shared by the online selector and the offline cut replay:
//! gates and their persisted flags, reconstructed events, truth categories,
//! persisted records and the collaborator traits the selector depends on.

#![warn(missing_docs)]

pub mod error;
pub mod event;
pub mod flags;
pub mod gate;
pub mod kinematics;
pub mod record;
pub mod traits;
pub mod truth;

pub use error::{Error, Result};
pub use event::{Event, Particle, ParticleKind, Prong, ShowerSummary, Track, Vertex};
pub use flags::Flags;
pub use gate::{Gate, GateKind};
pub use kinematics::{BeamFrame, FourMomentum, Point3};
pub use record::{EventRecord, Interpretation, Refusal, SelectionOutcome, TruthRecord};
pub use truth::{BackgroundReaction, Pi0Content, TruthCategory, TruthInfo, TruthLabel};

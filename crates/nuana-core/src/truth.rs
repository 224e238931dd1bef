//! Truth categories for simulated events.
//!
//! The category is an explicit value passed into every counter increment;
//! nothing reads truth flags from shared state.

use serde::{Deserialize, Serialize};

use crate::kinematics::Point3;

/// PDG code of the muon neutrino.
pub const PDG_NU_MU: i32 = 14;

/// Generator-level summary of a simulated interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruthInfo {
    /// 1 = charged current, 2 = neutral current.
    pub current: i32,
    /// Incoming neutrino PDG code.
    pub neutrino_pdg: i32,
    /// Generator interaction type (1 QE, 2 RES, 3 DIS, ...).
    #[serde(default)]
    pub int_type: i32,
    /// True interaction vertex.
    pub vertex: Point3,
    /// Final-state protons.
    #[serde(default)]
    pub n_proton: u32,
    /// Final-state neutral pions.
    #[serde(default)]
    pub n_pi0: u32,
    /// Final-state charged pions.
    #[serde(default)]
    pub n_pi_charged: u32,
    /// Other final-state mesons (kaons, etas, ...).
    #[serde(default)]
    pub n_other_mesons: u32,
    /// A true Michel electron exists in the event.
    #[serde(default)]
    pub has_michel: bool,
    /// Generator consistency check passed.
    #[serde(default = "default_true")]
    pub plausible: bool,
    /// Generator event weight.
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

impl TruthInfo {
    /// Signal: CC ν_μ with at least one proton, exactly one π⁰ and no charged pion.
    pub fn is_signal(&self) -> bool {
        self.current == 1
            && self.neutrino_pdg == PDG_NU_MU
            && self.n_proton > 0
            && self.n_pi0 == 1
            && self.n_pi_charged == 0
    }

    /// Classify the interaction.
    pub fn category(&self) -> TruthCategory {
        if self.is_signal() {
            return TruthCategory::Signal;
        }
        let reaction = if self.current == 2 {
            BackgroundReaction::Nc
        } else if self.neutrino_pdg == -PDG_NU_MU {
            BackgroundReaction::AntiNeutrino
        } else if self.n_other_mesons > 0 {
            BackgroundReaction::Other
        } else {
            match self.n_pi0 + self.n_pi_charged {
                0 => BackgroundReaction::QeLike,
                1 => BackgroundReaction::SinglePion,
                2 => BackgroundReaction::DoublePion,
                _ => BackgroundReaction::MultiPion,
            }
        };
        let pi0 = match self.n_pi0 {
            0 => Pi0Content::NoPi0,
            1 => Pi0Content::SinglePi0,
            _ => Pi0Content::MultiPi0,
        };
        TruthCategory::Background { reaction, pi0 }
    }
}

/// Background reaction type. Mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackgroundReaction {
    /// Neutral current.
    #[serde(rename = "NC")]
    Nc,
    /// Anti-neutrino interaction.
    AntiNeutrino,
    /// No pions in the final state.
    #[serde(rename = "QELike")]
    QeLike,
    /// One pion.
    SinglePion,
    /// Two pions.
    DoublePion,
    /// Three or more pions.
    MultiPion,
    /// Anything else.
    Other,
}

impl BackgroundReaction {
    /// All reactions, in report order.
    pub const ALL: [BackgroundReaction; 7] = [
        BackgroundReaction::Nc,
        BackgroundReaction::AntiNeutrino,
        BackgroundReaction::QeLike,
        BackgroundReaction::SinglePion,
        BackgroundReaction::DoublePion,
        BackgroundReaction::MultiPion,
        BackgroundReaction::Other,
    ];

    /// Slot in counter arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Report label.
    pub fn name(self) -> &'static str {
        match self {
            BackgroundReaction::Nc => "NC",
            BackgroundReaction::AntiNeutrino => "AntiNeutrino",
            BackgroundReaction::QeLike => "QELike",
            BackgroundReaction::SinglePion => "SinglePion",
            BackgroundReaction::DoublePion => "DoublePion",
            BackgroundReaction::MultiPion => "MultiPion",
            BackgroundReaction::Other => "Other",
        }
    }
}

/// Neutral-pion content of a background event. Mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pi0Content {
    /// No π⁰.
    NoPi0,
    /// Exactly one π⁰.
    SinglePi0,
    /// Two or more π⁰.
    MultiPi0,
}

impl Pi0Content {
    /// All variants, in report order.
    pub const ALL: [Pi0Content; 3] = [Pi0Content::NoPi0, Pi0Content::SinglePi0, Pi0Content::MultiPi0];

    /// Slot in counter arrays.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Report label.
    pub fn name(self) -> &'static str {
        match self {
            Pi0Content::NoPi0 => "NoPi0",
            Pi0Content::SinglePi0 => "SinglePi0",
            Pi0Content::MultiPi0 => "MultiPi0",
        }
    }
}

/// Truth category of one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TruthCategory {
    /// Real data; no truth.
    Data,
    /// Signal interaction.
    Signal,
    /// Background, by reaction and π⁰ content.
    Background {
        /// Reaction type.
        reaction: BackgroundReaction,
        /// π⁰ content.
        pi0: Pi0Content,
    },
}

impl TruthCategory {
    /// Signal?
    pub fn is_signal(&self) -> bool {
        matches!(self, TruthCategory::Signal)
    }

    /// Background?
    pub fn is_background(&self) -> bool {
        matches!(self, TruthCategory::Background { .. })
    }
}

/// Everything a counter needs to know about one event's truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthLabel {
    /// Category.
    pub category: TruthCategory,
    /// First cross-cutting study flag.
    pub study1: bool,
    /// Second cross-cutting study flag.
    pub study2: bool,
}

impl TruthLabel {
    /// Label for real data.
    pub fn data() -> Self {
        Self { category: TruthCategory::Data, study1: false, study2: false }
    }

    /// Label with no study flags.
    pub fn new(category: TruthCategory) -> Self {
        Self { category, study1: false, study2: false }
    }

    /// Set study flags.
    pub fn with_studies(mut self, study1: bool, study2: bool) -> Self {
        self.study1 = study1;
        self.study2 = study2;
        self
    }
}

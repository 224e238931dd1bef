//! Persisted per-event record: flags, outcome, interpretation and truth.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flags::Flags;
use crate::gate::Gate;
use crate::kinematics::{FourMomentum, Point3};
use crate::truth::{TruthCategory, TruthInfo};

/// Why an event was abandoned without a physics decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason")]
pub enum Refusal {
    /// Some reconstructed object is flagged corrupt.
    BadObject,
    /// Simulated truth failed the generator consistency check.
    ImplausibleTruth,
    /// Null reference, NaN coordinate or failed plane lookup.
    Integrity(String),
}

impl Refusal {
    /// Short label.
    pub fn label(&self) -> &'static str {
        match self {
            Refusal::BadObject => "BadObject",
            Refusal::ImplausibleTruth => "ImplausibleTruth",
            Refusal::Integrity(_) => "Integrity",
        }
    }
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Refusal::Integrity(reason) => write!(f, "Integrity({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// Result of running the online selector over one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SelectionOutcome {
    /// Every online gate passed.
    Passed,
    /// Stopped at the first failing gate.
    Failed {
        /// The failing gate.
        gate: Gate,
    },
    /// Abandoned without a physics decision.
    Refused {
        /// Why.
        refusal: Refusal,
    },
}

impl SelectionOutcome {
    /// Passed?
    pub fn passed(&self) -> bool {
        matches!(self, SelectionOutcome::Passed)
    }

    /// Failing gate, if any.
    pub fn failed_gate(&self) -> Option<Gate> {
        match self {
            SelectionOutcome::Failed { gate } => Some(*gate),
            _ => None,
        }
    }
}

/// Interaction tags written with every interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionCurrent {
    /// Charged current.
    ChargedCurrent,
}

/// Interaction type hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InteractionType {
    /// Not determined by the reconstruction.
    UnknownInt,
}

/// Vertex position and the nearest detector plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexInfo {
    /// Position (mm).
    pub position: Point3,
    /// Time (ns).
    pub time: f64,
    /// Detector module.
    pub module: i32,
    /// Plane within the module.
    pub plane: i32,
}

/// Muon kinematics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MuonKinematics {
    /// Four-momentum (MeV).
    pub four_momentum: FourMomentum,
    /// |p| (MeV).
    pub p: f64,
    /// Angle w.r.t. the beam (rad).
    pub theta: f64,
    /// θ(beam + bias) − θ.
    pub theta_bias_up: f64,
    /// θ(beam − bias) − θ.
    pub theta_bias_down: f64,
    /// PID score.
    pub score: f64,
    /// q/p from the muon spectrometer.
    pub qp: f64,
    /// Leading track has a kink.
    pub kinked: bool,
}

/// Kinematics of one proton slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtonKinematics {
    /// Four-momentum from the calorimetric energy (MeV).
    pub four_momentum: FourMomentum,
    /// Kinetic energy (MeV).
    pub ekin: f64,
    /// |p| after calorimetric correction (MeV).
    pub p_cal_correction: f64,
    /// |p| from the dE/dx fit (MeV).
    pub p_dedx: f64,
    /// Track start.
    pub start: Point3,
    /// Track end.
    pub end: Point3,
    /// Track has a kink.
    pub kinked: bool,
    /// Track exits into the outer detector.
    pub od_matched: bool,
    /// Proton PID score.
    pub score: f64,
    /// First likelihood component.
    pub score1: f64,
    /// Second likelihood component.
    pub score2: f64,
    /// dE/dx fit χ²/ndf.
    pub chi2_ndf: f64,
    /// Pion-hypothesis score of the same prong (0 if none).
    pub pion_score: f64,
    /// Proton/pion log-likelihood ratio.
    pub llr: f64,
    /// Angle w.r.t. the beam (rad).
    pub theta: f64,
    /// θ_x (rad).
    pub theta_x: f64,
    /// θ_y (rad).
    pub theta_y: f64,
    /// Azimuth (rad).
    pub phi: f64,
}

/// π⁰ reconstructed from two photons.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pi0Kinematics {
    /// Sum of photon four-momenta (MeV).
    pub four_momentum: FourMomentum,
    /// Di-photon invariant mass (MeV).
    pub inv_mass: f64,
    /// Leading photon conversion distance (mm).
    pub gamma1_distance: f64,
    /// Second photon conversion distance (mm).
    pub gamma2_distance: f64,
    /// Leading photon energy (MeV).
    pub gamma1_energy: f64,
    /// Second photon energy (MeV).
    pub gamma2_energy: f64,
}

/// Physics hypothesis for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interpretation {
    /// Set on placeholder records: the gate the event failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_gate: Option<Gate>,
    /// Vertex.
    #[serde(default)]
    pub vertex: Option<VertexInfo>,
    /// Current tag.
    #[serde(default)]
    pub current: Option<InteractionCurrent>,
    /// Interaction type tag.
    #[serde(default)]
    pub interaction: Option<InteractionType>,
    /// Muon.
    #[serde(default)]
    pub muon: Option<MuonKinematics>,
    /// Protons, leading first.
    #[serde(default)]
    pub protons: Vec<ProtonKinematics>,
    /// π⁰.
    #[serde(default)]
    pub pi0: Option<Pi0Kinematics>,
    /// Leading proton + π⁰ invariant mass (MeV).
    #[serde(default)]
    pub delta_inv_mass: Option<f64>,
    /// Calorimetric neutrino energy (MeV).
    #[serde(default)]
    pub neutrino_e_cal: f64,
    /// Visible energy used by the reconstruction (MeV).
    #[serde(default)]
    pub energy_used: f64,
    /// Visible energy left unused (MeV).
    #[serde(default)]
    pub energy_unused: f64,
}

impl Interpretation {
    /// Placeholder written for a failed event in store-all mode.
    pub fn placeholder(failed_gate: Gate) -> Self {
        Self {
            failed_gate: Some(failed_gate),
            vertex: None,
            current: None,
            interaction: None,
            muon: None,
            protons: Vec::new(),
            pi0: None,
            delta_inv_mass: None,
            neutrino_e_cal: 0.0,
            energy_used: 0.0,
            energy_unused: 0.0,
        }
    }

    /// Placeholder?
    pub fn is_placeholder(&self) -> bool {
        self.failed_gate.is_some()
    }
}

/// Reco-level truth tags filled for simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoTags {
    /// No corrupt object.
    pub has_good_objects: bool,
    /// Vertex present and well-formed.
    pub is_good_vertex: bool,
    /// Vertex inside the fiducial volume.
    pub is_fid_vol: bool,
    /// Smeared vertex inside the fiducial volume.
    pub is_fid_vol_smeared: bool,
    /// Muon matched to the spectrometer.
    pub is_minos_match: bool,
}

/// Truth block of a simulated record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TruthRecord {
    /// Category.
    pub category: TruthCategory,
    /// Background event with a true Michel electron.
    pub is_bckg_with_michel: bool,
    /// Generator summary.
    pub info: TruthInfo,
    /// Reco-level tags.
    pub reco: RecoTags,
}

impl TruthRecord {
    /// Truth block for `info`.
    pub fn new(info: TruthInfo) -> Self {
        let category = info.category();
        Self {
            category,
            is_bckg_with_michel: category.is_background() && info.has_michel,
            info,
            reco: RecoTags::default(),
        }
    }
}

/// One persisted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Run number.
    pub run: u32,
    /// Sub-run number.
    pub subrun: u32,
    /// Beam gate number.
    pub gate: u32,
    /// Position in the input stream.
    #[serde(default)]
    pub entry: u64,
    /// Prong count (topology).
    pub n_prongs: u32,
    /// Reconstructed vertex count.
    #[serde(default)]
    pub n_vertices: u32,
    /// Track count over all prongs.
    #[serde(default)]
    pub n_tracks: u32,
    /// `Cut_<Gate>` flags.
    pub flags: Flags,
    /// Online outcome.
    pub outcome: SelectionOutcome,
    /// Physics hypothesis (or placeholder).
    #[serde(default)]
    pub interpretation: Option<Interpretation>,
    /// Truth, for simulation.
    #[serde(default)]
    pub truth: Option<TruthRecord>,
}

impl EventRecord {
    /// Simulated?
    pub fn is_mc(&self) -> bool {
        self.truth.is_some()
    }

    /// Refused online?
    pub fn is_refused(&self) -> bool {
        matches!(self.outcome, SelectionOutcome::Refused { .. })
    }
}

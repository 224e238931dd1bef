//! Ordered decision points of the selection pipeline.
//!
//! The order of [`Gate::SEQUENCE`] is the pipeline order: the online selector
//! evaluates gates in this order and the offline replayer re-derives the same
//! decision walking the same order. Each gate other than [`Gate::All`] owns
//! exactly one persisted flag, `Cut_<Name>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How a gate's pass/fail decision is sourced when replaying a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// Entry point; every event passes.
    Entry,
    /// Decided online, persisted as `Cut_<Name>` (1 = failed).
    Flag,
    /// Decided offline from persisted kinematics against replay thresholds.
    Kinematic,
}

/// A named, ordered gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Gate {
    /// Every event entering the chain.
    #[serde(rename = "All")]
    All,
    /// No interaction vertex.
    #[serde(rename = "Vertex_None")]
    VertexNone,
    /// Interaction vertex flagged present but the reference is empty.
    #[serde(rename = "Vertex_Null")]
    VertexNull,
    /// Vertex outside the analyzable volume.
    #[serde(rename = "Vertex_Not_Analyzable", alias = "Vertex_Not_Reconstructable")]
    VertexNotAnalyzable,
    /// Vertex outside the fiducial volume.
    #[serde(rename = "Vertex_Not_Fiducial")]
    VertexNotFiducial,
    /// No (spectrometer matched) muon candidate.
    #[serde(rename = "Muon_None")]
    MuonNone,
    /// Simulated muon prong fails the truth plausibility check.
    #[serde(rename = "Muon_Not_Plausible")]
    MuonNotPlausible,
    /// Muon PID score below threshold.
    #[serde(rename = "Muon_Score_Low")]
    MuonScoreLow,
    /// Positive muon (anti-neutrino candidate).
    #[serde(rename = "Muon_Charge")]
    MuonCharge,
    /// Michel electron at the interaction vertex.
    #[serde(rename = "Vertex_Michel_Exist")]
    VertexMichelExist,
    /// Michel electron at a prong end point.
    #[serde(rename = "EndPoint_Michel_Exist")]
    EndPointMichelExist,
    /// Michel electron at an intermediate vertex of a multi-track prong.
    #[serde(rename = "secEndPoint_Michel_Exist")]
    SecEndPointMichelExist,
    /// No proton candidate found among the non-muon prongs.
    #[serde(rename = "Proton_None")]
    ProtonNone,
    /// Every proton candidate removed by the score filter.
    #[serde(rename = "Proton_Bad")]
    ProtonBad,
    /// Shower pre-filter energy rejection.
    #[serde(rename = "PreFilter_Pi0")]
    PreFilterPi0,
    /// Cone/blob reconstruction did not yield two photons.
    #[serde(rename = "ConeBlobs")]
    ConeBlobs,
    /// Photon blob direction inconsistent with the vertex.
    #[serde(rename = "BlobDirectionBad")]
    BlobDirectionBad,
    /// Leading photon converts too close to the vertex.
    #[serde(rename = "Photon1DistanceLow")]
    Photon1DistanceLow,
    /// Second photon converts too close to the vertex.
    #[serde(rename = "Photon2DistanceLow")]
    Photon2DistanceLow,
    /// Di-photon invariant mass outside the pi0 window.
    #[serde(rename = "Pi0_invMass")]
    Pi0InvMass,
    /// Second-pass proton PID (multi-prong only).
    #[serde(rename = "ProtonScore")]
    ProtonScore,
    /// Proton + pi0 invariant mass window (multi-prong only).
    #[serde(rename = "DeltaInvMass")]
    DeltaInvMass,
    /// Calorimetric neutrino energy above the beam cut.
    #[serde(rename = "beamEnergy")]
    BeamEnergy,
    /// Too much calorimetric energy left unused by the reconstruction.
    #[serde(rename = "UnusedE")]
    UnusedE,
}

impl Gate {
    /// Every gate, in pipeline order.
    pub const SEQUENCE: [Gate; 24] = [
        Gate::All,
        Gate::VertexNone,
        Gate::VertexNull,
        Gate::VertexNotAnalyzable,
        Gate::VertexNotFiducial,
        Gate::MuonNone,
        Gate::MuonNotPlausible,
        Gate::MuonScoreLow,
        Gate::MuonCharge,
        Gate::VertexMichelExist,
        Gate::EndPointMichelExist,
        Gate::SecEndPointMichelExist,
        Gate::ProtonNone,
        Gate::ProtonBad,
        Gate::PreFilterPi0,
        Gate::ConeBlobs,
        Gate::BlobDirectionBad,
        Gate::Photon1DistanceLow,
        Gate::Photon2DistanceLow,
        Gate::Pi0InvMass,
        Gate::ProtonScore,
        Gate::DeltaInvMass,
        Gate::BeamEnergy,
        Gate::UnusedE,
    ];

    /// Number of gates.
    pub const COUNT: usize = Self::SEQUENCE.len();

    /// Position in the pipeline.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Gate following this one, if any.
    pub fn next(self) -> Option<Gate> {
        Self::SEQUENCE.get(self.index() + 1).copied()
    }

    /// Report name, e.g. `Vertex_None`.
    pub fn name(self) -> &'static str {
        match self {
            Gate::All => "All",
            Gate::VertexNone => "Vertex_None",
            Gate::VertexNull => "Vertex_Null",
            Gate::VertexNotAnalyzable => "Vertex_Not_Analyzable",
            Gate::VertexNotFiducial => "Vertex_Not_Fiducial",
            Gate::MuonNone => "Muon_None",
            Gate::MuonNotPlausible => "Muon_Not_Plausible",
            Gate::MuonScoreLow => "Muon_Score_Low",
            Gate::MuonCharge => "Muon_Charge",
            Gate::VertexMichelExist => "Vertex_Michel_Exist",
            Gate::EndPointMichelExist => "EndPoint_Michel_Exist",
            Gate::SecEndPointMichelExist => "secEndPoint_Michel_Exist",
            Gate::ProtonNone => "Proton_None",
            Gate::ProtonBad => "Proton_Bad",
            Gate::PreFilterPi0 => "PreFilter_Pi0",
            Gate::ConeBlobs => "ConeBlobs",
            Gate::BlobDirectionBad => "BlobDirectionBad",
            Gate::Photon1DistanceLow => "Photon1DistanceLow",
            Gate::Photon2DistanceLow => "Photon2DistanceLow",
            Gate::Pi0InvMass => "Pi0_invMass",
            Gate::ProtonScore => "ProtonScore",
            Gate::DeltaInvMass => "DeltaInvMass",
            Gate::BeamEnergy => "beamEnergy",
            Gate::UnusedE => "UnusedE",
        }
    }

    /// Persisted flag name (`Cut_<Name>`). `None` for [`Gate::All`].
    pub fn flag_name(self) -> Option<String> {
        match self {
            Gate::All => None,
            g => Some(format!("Cut_{}", g.name())),
        }
    }

    /// Older flag name still accepted when reading records.
    pub fn legacy_flag_name(self) -> Option<&'static str> {
        match self {
            Gate::VertexNotAnalyzable => Some("Cut_Vertex_Not_Reconstructable"),
            _ => None,
        }
    }

    /// Where the replayer takes this gate's decision from.
    pub fn kind(self) -> GateKind {
        match self {
            Gate::All => GateKind::Entry,
            Gate::Photon1DistanceLow
            | Gate::Photon2DistanceLow
            | Gate::Pi0InvMass
            | Gate::ProtonScore
            | Gate::DeltaInvMass
            | Gate::BeamEnergy
            | Gate::UnusedE => GateKind::Kinematic,
            _ => GateKind::Flag,
        }
    }

    /// Gates that only apply to events with two or more prongs. Single-prong
    /// events pass them without evaluation.
    pub fn multi_prong_only(self) -> bool {
        matches!(self, Gate::ProtonScore | Gate::DeltaInvMass)
    }

    /// Look up a gate by report name (legacy names accepted).
    pub fn from_name(name: &str) -> Option<Gate> {
        if name == "Vertex_Not_Reconstructable" {
            return Some(Gate::VertexNotAnalyzable);
        }
        Self::SEQUENCE.iter().copied().find(|g| g.name() == name)
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Gate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.strip_prefix("Cut_").unwrap_or(s);
        Gate::from_name(name).ok_or_else(|| Error::Validation(format!("unknown gate '{s}'")))
    }
}

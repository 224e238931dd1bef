//! Collaborator traits for the selector
//!
//! Geometry, pattern recognition, PID and calorimetry live outside the
//! selection pipeline. The selector only depends on these traits; concrete
//! tools are injected at construction.

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::event::{Event, Particle, Prong, Vertex};
use crate::kinematics::{FourMomentum, Point3};

/// Hexagonal detector region: apothem plus a z range (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Hexagon apothem (mm).
    pub apothem: f64,
    /// Upstream z edge (mm).
    pub z_upstream: f64,
    /// Downstream z edge (mm).
    pub z_downstream: f64,
}

impl VolumeSpec {
    /// Tracker fiducial volume.
    pub fn fiducial() -> Self {
        Self { apothem: 850.0, z_upstream: 5990.0, z_downstream: 8340.0 }
    }

    /// Analyzable (reconstructable) volume, coarser than fiducial.
    pub fn analyzable() -> Self {
        Self { apothem: 1000.0, z_upstream: 5750.0, z_downstream: 8700.0 }
    }
}

/// Detector module and plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanePosition {
    /// Module number.
    pub module: i32,
    /// Plane within the module (1 or 2).
    pub plane: i32,
}

/// Muon candidate returned by a [`MuonFinder`].
#[derive(Debug, Clone, PartialEq)]
pub struct MuonCandidate {
    /// Index into `Event::prongs`.
    pub prong: usize,
    /// Muon hypothesis. `None` when the prong's particle reference is empty.
    pub particle: Option<Particle>,
}

/// Michel electron found near a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MichelHit {
    /// Cluster position (mm).
    pub position: Point3,
    /// Distance from the search point (mm).
    pub distance: f64,
    /// Cluster energy (MeV).
    pub energy: f64,
}

/// Proton candidate returned by a [`ProtonFinder`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProtonCandidate {
    /// Index into `Event::prongs`.
    pub prong: usize,
    /// Proton hypothesis.
    pub particle: Particle,
}

/// Fiducial-volume lookup.
pub trait FiducialVolume: Send + Sync {
    /// Is `point` inside `volume`?
    fn is_inside(&self, point: &Point3, volume: &VolumeSpec) -> bool;
}

/// Nearest detector plane lookup.
pub trait PlaneLocator: Send + Sync {
    /// Module/plane nearest to `z`. Fails outside the detector.
    fn nearest_plane(&self, z: f64) -> Result<PlanePosition>;
}

/// Muon identification.
pub trait MuonFinder: Send + Sync {
    /// Find the primary muon prong.
    fn find_muon(&self, event: &Event) -> Option<MuonCandidate>;
}

/// Michel electron search.
pub trait MichelFinder: Send + Sync {
    /// Michel attached to the interaction vertex.
    fn find_at_vertex(&self, event: &Event, vertex: &Vertex) -> Option<MichelHit>;

    /// Michel near a track end point or intermediate vertex.
    fn find_at_point(&self, event: &Event, point: &Point3) -> Option<MichelHit>;
}

/// Proton identification.
pub trait ProtonFinder: Send + Sync {
    /// Proton candidates among `prongs` (indices into `Event::prongs`), best first.
    fn find_protons(&self, event: &Event, prongs: &[usize]) -> Vec<ProtonCandidate>;
}

/// Calorimetric energy correction.
pub trait Calorimetry: Send + Sync {
    /// Calibrated energy of the prong's clusters (MeV).
    fn apply_cal_consts(&self, prong: &Prong) -> f64;

    /// Corrected four-momentum of `particle` on `prong` for a vertex at `vertex_z`.
    fn corrected_energy(&self, prong: &Prong, particle: &Particle, vertex_z: f64) -> FourMomentum;
}

/// Plausibility checks against simulated truth.
pub trait Plausibility: Send + Sync {
    /// Generator truth is self-consistent.
    fn truth_is_plausible(&self, event: &Event) -> bool;

    /// The muon prong matches a real truth particle.
    fn muon_is_plausible(&self, event: &Event, prong: &Prong) -> bool;
}

//! Reconstructed event as delivered by upstream pattern recognition.

use serde::{Deserialize, Serialize};

use crate::kinematics::{FourMomentum, Point3};
use crate::truth::TruthInfo;

/// One detector trigger's worth of reconstructed objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Run number.
    #[serde(default)]
    pub run: u32,
    /// Sub-run number.
    #[serde(default)]
    pub subrun: u32,
    /// Beam gate (spill) number.
    #[serde(default)]
    pub gate: u32,
    /// Position in the input stream; seeds per-event random numbers.
    /// Readers fill it from the line position when the input omits it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<u64>,
    /// The reconstruction reports an interaction vertex.
    #[serde(default)]
    pub has_interaction_vertex: bool,
    /// The interaction vertex. `None` while `has_interaction_vertex` is set
    /// means an empty reference.
    #[serde(default)]
    pub vertex: Option<Vertex>,
    /// Total reconstructed vertices.
    #[serde(default)]
    pub n_vertices: u32,
    /// Particle candidates attached to the vertex.
    #[serde(default)]
    pub prongs: Vec<Prong>,
    /// Some reconstructed object is flagged corrupt.
    #[serde(default)]
    pub bad_object: bool,
    /// Decay-electron clusters found by the upstream Michel search.
    #[serde(default)]
    pub michel_clusters: Vec<MichelCluster>,
    /// Upstream π⁰ shower reconstruction.
    #[serde(default)]
    pub shower: Option<ShowerSummary>,
    /// Visible energy bookkeeping.
    #[serde(default)]
    pub energy: EnergySummary,
    /// Generator truth; present only for simulation.
    #[serde(default)]
    pub truth: Option<TruthInfo>,
}

impl Event {
    /// Empty event with the given ids.
    pub fn new(run: u32, subrun: u32, gate: u32) -> Self {
        Self { run, subrun, gate, ..Self::default() }
    }

    /// Set the input position.
    pub fn with_entry(mut self, entry: u64) -> Self {
        self.entry = Some(entry);
        self
    }

    /// Input position, 0 when unknown.
    pub fn entry(&self) -> u64 {
        self.entry.unwrap_or_default()
    }

    /// Attach an interaction vertex.
    pub fn with_vertex(mut self, vertex: Vertex) -> Self {
        self.has_interaction_vertex = true;
        self.vertex = Some(vertex);
        self.n_vertices = self.n_vertices.max(1);
        self
    }

    /// Append a prong.
    pub fn with_prong(mut self, prong: Prong) -> Self {
        self.prongs.push(prong);
        self
    }

    /// Attach generator truth.
    pub fn with_truth(mut self, truth: TruthInfo) -> Self {
        self.truth = Some(truth);
        self
    }

    /// Attach a shower summary.
    pub fn with_shower(mut self, shower: ShowerSummary) -> Self {
        self.shower = Some(shower);
        self
    }

    /// Simulated event?
    pub fn is_mc(&self) -> bool {
        self.truth.is_some()
    }

    /// Number of prongs (the topology count).
    pub fn n_prongs(&self) -> u32 {
        self.prongs.len() as u32
    }

    /// Total tracks over all prongs.
    pub fn n_tracks(&self) -> u32 {
        self.prongs.iter().map(|p| p.tracks.len() as u32).sum()
    }

    /// Any object flagged corrupt, at event or prong level.
    pub fn has_bad_object(&self) -> bool {
        self.bad_object || self.prongs.iter().any(|p| p.bad_object)
    }
}

/// Interaction vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// Position (mm).
    pub position: Point3,
    /// Time (ns).
    #[serde(default)]
    pub time: f64,
}

impl Vertex {
    /// Vertex at `position`, time zero.
    pub fn at(position: Point3) -> Self {
        Self { position, time: 0.0 }
    }
}

/// Particle candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prong {
    /// Id within the event.
    #[serde(default)]
    pub id: u32,
    /// Attached to the primary vertex.
    #[serde(default = "default_true")]
    pub is_primary: bool,
    /// Flagged corrupt by the reconstruction.
    #[serde(default)]
    pub bad_object: bool,
    /// Particle hypotheses exist but the reference to them is empty.
    #[serde(default)]
    pub null_reference: bool,
    /// Truth-matched plausibility (simulation).
    #[serde(default = "default_true")]
    pub plausible: bool,
    /// q/p of the matched muon spectrometer track, if matched (1/MeV).
    #[serde(default)]
    pub minos_qp: Option<f64>,
    /// Raw calorimetric energy of the prong's clusters (MeV).
    #[serde(default)]
    pub visible_energy: f64,
    /// Tracks, leading track first.
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// Particle hypotheses assigned by PID.
    #[serde(default)]
    pub particles: Vec<Particle>,
}

fn default_true() -> bool {
    true
}

impl Prong {
    /// Primary prong with the given id.
    pub fn new(id: u32) -> Self {
        Self { id, is_primary: true, plausible: true, ..Self::default() }
    }

    /// Append a track.
    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    /// Append a particle hypothesis.
    pub fn with_particle(mut self, particle: Particle) -> Self {
        self.particles.push(particle);
        self
    }

    /// Mark as matched to the muon spectrometer with `qp`.
    pub fn with_minos_qp(mut self, qp: f64) -> Self {
        self.minos_qp = Some(qp);
        self
    }

    /// Best-scoring hypothesis of `kind`.
    pub fn best(&self, kind: ParticleKind) -> Option<&Particle> {
        self.particles
            .iter()
            .filter(|p| p.kind == kind)
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }

    /// Leading track.
    pub fn leading_track(&self) -> Option<&Track> {
        self.tracks.first()
    }

    /// All tracks are short (fewer hit planes than a long track).
    pub fn is_short_only(&self) -> bool {
        !self.tracks.is_empty() && self.tracks.iter().all(|t| t.kind == TrackKind::Short)
    }
}

/// Track pattern kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    /// Long track.
    #[default]
    Long,
    /// Short track.
    Short,
}

/// Track direction classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackDirection {
    /// Downstream going.
    #[default]
    Forward,
    /// Upstream going.
    Backward,
}

/// Reconstructed track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Pattern kind.
    #[serde(default)]
    pub kind: TrackKind,
    /// Direction classification.
    #[serde(default)]
    pub direction: TrackDirection,
    /// First node.
    pub start: Point3,
    /// Last node.
    pub end: Point3,
    /// Polar angle in detector coordinates (rad).
    #[serde(default)]
    pub theta: f64,
    /// Azimuth (rad).
    #[serde(default)]
    pub phi: f64,
    /// Track has a kink.
    #[serde(default)]
    pub kinked: bool,
    /// Track exits into the outer detector.
    #[serde(default)]
    pub od_matched: bool,
    /// Vertices along the track joining track segments.
    #[serde(default)]
    pub intermediate_vertices: Vec<Point3>,
}

impl Track {
    /// Straight forward track from `start` to `end`.
    pub fn between(start: Point3, end: Point3) -> Self {
        let (dx, dy, dz) = (end.x - start.x, end.y - start.y, end.z - start.z);
        let len = (dx * dx + dy * dy + dz * dz).sqrt();
        let theta = if len == 0.0 { 0.0 } else { (dz / len).clamp(-1.0, 1.0).acos() };
        Self {
            start,
            end,
            theta,
            phi: dy.atan2(dx),
            direction: if dz < 0.0 { TrackDirection::Backward } else { TrackDirection::Forward },
            ..Self::default()
        }
    }

    /// θ_x = atan(tan θ · cos φ).
    pub fn theta_x(&self) -> f64 {
        (self.theta.tan() * self.phi.cos()).atan()
    }

    /// θ_y = atan(tan θ · sin φ).
    pub fn theta_y(&self) -> f64 {
        (self.theta.tan() * self.phi.sin()).atan()
    }
}

/// Particle hypothesis kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleKind {
    /// μ
    Muon,
    /// p
    Proton,
    /// π±
    Pion,
}

/// Particle hypothesis with PID scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Hypothesis.
    pub kind: ParticleKind,
    /// PID score in [0, 1].
    #[serde(default)]
    pub score: f64,
    /// First likelihood component.
    #[serde(default)]
    pub score1: f64,
    /// Second likelihood component.
    #[serde(default)]
    pub score2: f64,
    /// dE/dx fit χ²/ndf.
    #[serde(default)]
    pub chi2_ndf: f64,
    /// Log-likelihood ratio (proton vs pion).
    #[serde(default)]
    pub llr: f64,
    /// Four-momentum from the PID fit (MeV).
    pub four_momentum: FourMomentum,
}

impl Particle {
    /// Hypothesis with a score and four-momentum.
    pub fn new(kind: ParticleKind, score: f64, four_momentum: FourMomentum) -> Self {
        Self { kind, score, score1: 0.0, score2: 0.0, chi2_ndf: 0.0, llr: 0.0, four_momentum }
    }
}

/// Decay-electron cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MichelCluster {
    /// Position (mm).
    pub position: Point3,
    /// Energy (MeV).
    #[serde(default)]
    pub energy: f64,
    /// Time after the vertex (ns).
    #[serde(default)]
    pub delay: f64,
}

/// Reconstructed photon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Photon {
    /// Four-momentum (MeV).
    pub four_momentum: FourMomentum,
    /// Conversion distance from the vertex (mm).
    pub vertex_distance: f64,
}

/// Output of the upstream π⁰ shower reconstruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowerSummary {
    /// Pre-filter rejected the event on visible energy.
    #[serde(default)]
    pub prefilter_rejected: bool,
    /// Blob direction inconsistent with the vertex.
    #[serde(default)]
    pub blob_direction_bad: bool,
    /// Leading photon.
    #[serde(default)]
    pub gamma1: Option<Photon>,
    /// Second photon.
    #[serde(default)]
    pub gamma2: Option<Photon>,
}

impl ShowerSummary {
    /// Both photons reconstructed.
    pub fn has_two_photons(&self) -> bool {
        self.gamma1.is_some() && self.gamma2.is_some()
    }
}

/// Visible-energy bookkeeping after reconstruction (MeV).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergySummary {
    /// Energy assigned to reconstructed particles.
    #[serde(default)]
    pub used: f64,
    /// Energy left unassigned.
    #[serde(default)]
    pub unused: f64,
}

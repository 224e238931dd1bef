//! Reference collaborator tools.
//!
//! Minimal implementations of the selector's collaborator traits that work
//! directly on the reconstructed objects carried by [`Event`]. Production
//! geometry and PID services plug in through the same traits.

use nuana_core::event::{Event, Particle, ParticleKind, Prong, Vertex};
use nuana_core::kinematics::{FourMomentum, Point3};
use nuana_core::traits::{
    Calorimetry, FiducialVolume, MichelFinder, MichelHit, MuonCandidate, MuonFinder, PlaneLocator,
    PlanePosition, Plausibility, ProtonCandidate, ProtonFinder, VolumeSpec,
};
use nuana_core::{Error, Result};

// ── Geometry ────────────────────────────────────────────────────────

/// Hexagonal prism with flat top and bottom faces.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexagonalVolume;

impl HexagonalVolume {
    /// Inside the hexagon of the given apothem, ignoring z.
    pub fn in_hexagon(x: f64, y: f64, apothem: f64) -> bool {
        let (s, c) = 30f64.to_radians().sin_cos();
        y.abs() <= apothem && (c * x + s * y).abs() <= apothem && (c * x - s * y).abs() <= apothem
    }
}

impl FiducialVolume for HexagonalVolume {
    fn is_inside(&self, point: &Point3, volume: &VolumeSpec) -> bool {
        point.is_finite()
            && (volume.z_upstream..=volume.z_downstream).contains(&point.z)
            && Self::in_hexagon(point.x, point.y, volume.apothem)
    }
}

/// Evenly spaced detector planes, two per module.
#[derive(Debug, Clone, Copy)]
pub struct PlaneTable {
    /// z of plane 1 of the first module (mm).
    pub first_z: f64,
    /// Module pitch (mm).
    pub module_pitch: f64,
    /// Number of the first module.
    pub first_module: i32,
    /// Number of modules.
    pub n_modules: i32,
}

impl Default for PlaneTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaneTable {
    /// Inner-detector layout: modules −5..=114, plane 1 of module 27 at z = 5990 mm.
    pub fn new() -> Self {
        let module_pitch = 2350.0 / 52.0;
        Self { first_z: 5990.0 - 32.0 * module_pitch, module_pitch, first_module: -5, n_modules: 120 }
    }

    fn plane_pitch(&self) -> f64 {
        self.module_pitch / 2.0
    }
}

impl PlaneLocator for PlaneTable {
    fn nearest_plane(&self, z: f64) -> Result<PlanePosition> {
        let pitch = self.plane_pitch();
        let n_planes = 2 * self.n_modules;
        let idx = ((z - self.first_z) / pitch).round();
        if !idx.is_finite() || idx < 0.0 || idx >= f64::from(n_planes) {
            return Err(Error::Integrity(format!("no detector plane near z = {z} mm")));
        }
        let idx = idx as i32;
        Ok(PlanePosition { module: self.first_module + idx / 2, plane: idx % 2 + 1 })
    }
}

// ── Pattern recognition and PID ─────────────────────────────────────

/// Primary prong matched to the muon spectrometer with the best muon score.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinosMatchedMuonFinder;

impl MuonFinder for MinosMatchedMuonFinder {
    fn find_muon(&self, event: &Event) -> Option<MuonCandidate> {
        let matched = event
            .prongs
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_primary && p.minos_qp.is_some());

        let mut best: Option<(usize, Option<&Particle>)> = None;
        for (i, prong) in matched {
            if prong.null_reference {
                if best.is_none() {
                    best = Some((i, None));
                }
                continue;
            }
            let Some(muon) = prong.best(ParticleKind::Muon) else { continue };
            let better = match best {
                Some((_, Some(cur))) => muon.score > cur.score,
                _ => true,
            };
            if better {
                best = Some((i, Some(muon)));
            }
        }
        best.map(|(prong, particle)| MuonCandidate { prong, particle: particle.cloned() })
    }
}

/// Nearest decay-electron cluster within a search radius.
#[derive(Debug, Clone, Copy)]
pub struct ClusterMichelFinder {
    /// Search radius around the interaction vertex (mm).
    pub vertex_radius: f64,
    /// Search radius around track end points (mm).
    pub point_radius: f64,
}

impl Default for ClusterMichelFinder {
    fn default() -> Self {
        Self { vertex_radius: 100.0, point_radius: 60.0 }
    }
}

impl ClusterMichelFinder {
    fn nearest(event: &Event, point: &Point3, radius: f64) -> Option<MichelHit> {
        event
            .michel_clusters
            .iter()
            .map(|c| MichelHit { position: c.position, distance: c.position.distance(point), energy: c.energy })
            .filter(|hit| hit.distance <= radius)
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

impl MichelFinder for ClusterMichelFinder {
    fn find_at_vertex(&self, event: &Event, vertex: &Vertex) -> Option<MichelHit> {
        Self::nearest(event, &vertex.position, self.vertex_radius)
    }

    fn find_at_point(&self, event: &Event, point: &Point3) -> Option<MichelHit> {
        Self::nearest(event, point, self.point_radius)
    }
}

/// Best proton hypothesis of each candidate prong, highest score first.
#[derive(Debug, Clone, Copy, Default)]
pub struct DedxProtonFinder;

impl ProtonFinder for DedxProtonFinder {
    fn find_protons(&self, event: &Event, prongs: &[usize]) -> Vec<ProtonCandidate> {
        let mut found: Vec<ProtonCandidate> = prongs
            .iter()
            .filter_map(|&i| {
                let prong = event.prongs.get(i)?;
                if prong.null_reference {
                    return None;
                }
                let particle = prong.best(ParticleKind::Proton)?.clone();
                Some(ProtonCandidate { prong: i, particle })
            })
            .collect();
        found.sort_by(|a, b| b.particle.score.total_cmp(&a.particle.score));
        found
    }
}

// ── Calorimetry and truth ───────────────────────────────────────────

/// Linear calibration of raw cluster energy.
#[derive(Debug, Clone, Copy)]
pub struct ScaledCalorimetry {
    /// Calibration constant applied to raw visible energy.
    pub scale: f64,
}

impl Default for ScaledCalorimetry {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl Calorimetry for ScaledCalorimetry {
    fn apply_cal_consts(&self, prong: &Prong) -> f64 {
        self.scale * prong.visible_energy
    }

    fn corrected_energy(&self, _prong: &Prong, particle: &Particle, _vertex_z: f64) -> FourMomentum {
        particle.four_momentum
    }
}

/// Plausibility from the truth-matching flags carried by the event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TruthMatchPlausibility;

impl Plausibility for TruthMatchPlausibility {
    fn truth_is_plausible(&self, event: &Event) -> bool {
        event.truth.as_ref().is_none_or(|t| t.plausible)
    }

    fn muon_is_plausible(&self, _event: &Event, prong: &Prong) -> bool {
        prong.plausible
    }
}

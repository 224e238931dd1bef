//! Selector options.

use nuana_core::traits::VolumeSpec;
use nuana_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Gaussian vertex resolution used for the smeared fiducial check (mm).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexSmear {
    /// σ_x (mm)
    pub x: f64,
    /// σ_y (mm)
    pub y: f64,
    /// σ_z (mm)
    pub z: f64,
}

impl Default for VertexSmear {
    fn default() -> Self {
        Self { x: 0.91, y: 1.25, z: 10.0 }
    }
}

/// Options of the online selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Keep a placeholder record for events that fail a gate.
    pub store_all_events: bool,
    /// Apply truth/muon plausibility checks on simulation.
    pub do_plausibility_cuts: bool,
    /// Let short-track-only prongs take part in proton identification.
    pub make_short_tracks: bool,
    /// Minimum muon PID score (inclusive).
    pub min_muon_score: f64,
    /// Proton candidates need a score strictly above this.
    pub min_proton_score: f64,
    /// Beam-angle shift for the θ systematic (rad).
    pub beam_angle_bias: f64,
    /// Beam angle about x (rad).
    pub beam_angle: f64,
    /// Seed for per-event random numbers.
    pub seed: u64,
    /// Fiducial volume.
    pub fiducial: VolumeSpec,
    /// Analyzable volume.
    pub analyzable: VolumeSpec,
    /// Vertex resolution for the smeared fiducial flag.
    pub vertex_smear: VertexSmear,
    /// Proton slots kept in the interpretation.
    pub max_proton_slots: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectorConfig {
    /// Production defaults.
    pub fn new() -> Self {
        Self {
            store_all_events: true,
            do_plausibility_cuts: true,
            make_short_tracks: true,
            min_muon_score: 0.9,
            min_proton_score: 0.1,
            beam_angle_bias: 0.006,
            beam_angle: nuana_core::BeamFrame::NOMINAL_ANGLE,
            seed: 0,
            fiducial: VolumeSpec::fiducial(),
            analyzable: VolumeSpec::analyzable(),
            vertex_smear: VertexSmear::default(),
            max_proton_slots: 10,
        }
    }

    /// Set store-all mode.
    pub fn store_all_events(mut self, on: bool) -> Self {
        self.store_all_events = on;
        self
    }

    /// Set plausibility checks.
    pub fn do_plausibility_cuts(mut self, on: bool) -> Self {
        self.do_plausibility_cuts = on;
        self
    }

    /// Set short-track proton candidates.
    pub fn make_short_tracks(mut self, on: bool) -> Self {
        self.make_short_tracks = on;
        self
    }

    /// Set the muon score threshold.
    pub fn min_muon_score(mut self, score: f64) -> Self {
        self.min_muon_score = score;
        self
    }

    /// Set the proton score threshold.
    pub fn min_proton_score(mut self, score: f64) -> Self {
        self.min_proton_score = score;
        self
    }

    /// Set the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check ranges.
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [("min_muon_score", self.min_muon_score), ("min_proton_score", self.min_proton_score)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Configuration(format!("{name} must be in [0, 1], got {v}")));
            }
        }
        if !self.beam_angle_bias.is_finite() || !self.beam_angle.is_finite() {
            return Err(Error::Configuration("beam angle and bias must be finite".into()));
        }
        let s = self.vertex_smear;
        if [s.x, s.y, s.z].iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::Configuration(format!("vertex smear must be finite and >= 0, got {s:?}")));
        }
        for (name, vol) in [("fiducial", self.fiducial), ("analyzable", self.analyzable)] {
            if vol.apothem <= 0.0 || vol.z_upstream >= vol.z_downstream {
                return Err(Error::Configuration(format!("{name} volume is empty: {vol:?}")));
            }
        }
        if self.max_proton_slots == 0 {
            return Err(Error::Configuration("max_proton_slots must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = SelectorConfig::default();
        assert!(c.store_all_events);
        assert!(c.do_plausibility_cuts);
        assert_eq!(c.min_muon_score, 0.9);
        assert_eq!(c.min_proton_score, 0.1);
        assert_eq!(c.beam_angle_bias, 0.006);
        assert_eq!(c.max_proton_slots, 10);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c: SelectorConfig = serde_json::from_str(r#"{"min_muon_score": 0.8}"#).unwrap();
        assert_eq!(c.min_muon_score, 0.8);
        assert_eq!(c.min_proton_score, 0.1);
        assert_eq!(c.fiducial.apothem, 850.0);
    }

    #[test]
    fn rejects_bad_ranges() {
        assert!(SelectorConfig::new().min_muon_score(1.5).validate().is_err());
        let mut c = SelectorConfig::new();
        c.vertex_smear.z = -1.0;
        assert!(matches!(c.validate(), Err(Error::Configuration(_))));
    }
}

//! Physics hypothesis for events that survive the selector.

use std::sync::Arc;

use nuana_core::event::{Event, Particle, ParticleKind, Prong, ShowerSummary, TrackDirection};
use nuana_core::kinematics::{BeamFrame, FourMomentum, PROTON_MASS};
use nuana_core::record::{
    InteractionCurrent, InteractionType, Interpretation, MuonKinematics, Pi0Kinematics,
    ProtonKinematics, VertexInfo,
};
use nuana_core::traits::{Calorimetry, PlaneLocator, ProtonCandidate};
use nuana_core::{Refusal, Vertex};

/// Objects accepted by the selector chain.
#[derive(Debug, Clone)]
pub struct Selected {
    /// Interaction vertex.
    pub vertex: Vertex,
    /// Index of the muon prong.
    pub muon_prong: usize,
    /// Muon hypothesis.
    pub muon: Particle,
    /// Proton candidates that passed the score filter, best first.
    pub protons: Vec<ProtonCandidate>,
}

/// Builds the [`Interpretation`] of a selected event.
#[derive(Clone)]
pub struct Interpreter {
    beam: BeamFrame,
    beam_angle_bias: f64,
    max_proton_slots: usize,
    planes: Arc<dyn PlaneLocator>,
    calorimetry: Arc<dyn Calorimetry>,
}

impl Interpreter {
    /// Interpreter with the nominal beam, ±0.006 rad bias and 10 proton slots.
    pub fn new(planes: Arc<dyn PlaneLocator>, calorimetry: Arc<dyn Calorimetry>) -> Self {
        Self { beam: BeamFrame::new(), beam_angle_bias: 0.006, max_proton_slots: 10, planes, calorimetry }
    }

    /// Set the beam frame.
    pub fn beam(mut self, beam: BeamFrame) -> Self {
        self.beam = beam;
        self
    }

    /// Set the beam-angle bias (rad).
    pub fn beam_angle_bias(mut self, bias: f64) -> Self {
        self.beam_angle_bias = bias;
        self
    }

    /// Set the number of proton slots.
    pub fn max_proton_slots(mut self, n: usize) -> Self {
        self.max_proton_slots = n;
        self
    }

    /// Build the interpretation. Integrity failures refuse the event.
    pub fn interpret(&self, event: &Event, selected: &Selected) -> Result<Interpretation, Refusal> {
        let pos = selected.vertex.position;
        if !pos.is_finite() {
            return Err(Refusal::Integrity("non-finite vertex position".into()));
        }
        let plane = self.planes.nearest_plane(pos.z).map_err(|e| Refusal::Integrity(e.to_string()))?;

        let muon_prong = event.prongs.get(selected.muon_prong).ok_or_else(|| {
            Refusal::Integrity(format!("muon prong index {} out of range", selected.muon_prong))
        })?;
        let muon = self.muon_kinematics(muon_prong, &selected.muon, pos.z)?;

        let n_found = selected.protons.len();
        if n_found > self.max_proton_slots {
            log::warn!(
                "run {} gate {}: {} proton candidates, keeping the first {}",
                event.run,
                event.gate,
                n_found,
                self.max_proton_slots
            );
        }
        let mut protons = Vec::with_capacity(n_found.min(self.max_proton_slots));
        for cand in selected.protons.iter().take(self.max_proton_slots) {
            let prong = event.prongs.get(cand.prong).ok_or_else(|| {
                Refusal::Integrity(format!("proton prong index {} out of range", cand.prong))
            })?;
            protons.push(self.proton_kinematics(prong, &cand.particle));
        }

        let pi0 = event.shower.as_ref().and_then(pi0_kinematics);
        let delta_inv_mass = match (protons.first(), pi0.as_ref()) {
            (Some(p), Some(pi0)) => Some((p.four_momentum + pi0.four_momentum).mass()),
            _ => None,
        };
        let neutrino_e_cal = muon.four_momentum.e
            + pi0.map_or(0.0, |p| p.four_momentum.e)
            + protons.iter().map(|p| p.ekin).sum::<f64>();

        Ok(Interpretation {
            failed_gate: None,
            vertex: Some(VertexInfo {
                position: pos,
                time: selected.vertex.time,
                module: plane.module,
                plane: plane.plane,
            }),
            current: Some(InteractionCurrent::ChargedCurrent),
            interaction: Some(InteractionType::UnknownInt),
            muon: Some(muon),
            protons,
            pi0,
            delta_inv_mass,
            neutrino_e_cal,
            energy_used: event.energy.used,
            energy_unused: event.energy.unused,
        })
    }

    /// Muon four-momentum and beam angles, including the biased-beam shifts.
    pub fn muon_kinematics(
        &self,
        prong: &Prong,
        particle: &Particle,
        vertex_z: f64,
    ) -> Result<MuonKinematics, Refusal> {
        let p4 = self.calorimetry.corrected_energy(prong, particle, vertex_z);
        let angle = |bias: f64| {
            self.beam
                .theta_wrt_beam(&p4, bias)
                .ok_or_else(|| Refusal::Integrity("muon has null momentum".into()))
        };
        let theta = angle(0.0)?;
        let theta_bias_up = angle(self.beam_angle_bias)? - theta;
        let theta_bias_down = angle(-self.beam_angle_bias)? - theta;
        Ok(MuonKinematics {
            four_momentum: p4,
            p: p4.p(),
            theta,
            theta_bias_up,
            theta_bias_down,
            score: particle.score,
            qp: prong.minos_qp.unwrap_or(0.0),
            kinked: prong.leading_track().is_some_and(|t| t.kinked),
        })
    }

    /// Proton kinematics from the track direction and the calorimetrically
    /// corrected energy.
    pub fn proton_kinematics(&self, prong: &Prong, particle: &Particle) -> ProtonKinematics {
        let track = prong.leading_track();
        let (theta_det, phi) = match track {
            Some(t) => (t.theta, t.phi),
            None => (particle.four_momentum.theta(), particle.four_momentum.phi()),
        };

        let e_corr = particle.four_momentum.e + self.calorimetry.apply_cal_consts(prong);
        let p = (e_corr * e_corr - PROTON_MASS * PROTON_MASS).max(0.0).sqrt();

        let mut p4 = FourMomentum::from_polar(p, theta_det, phi, PROTON_MASS);
        // Track fitter occasionally disagrees with the direction classification.
        if track.is_some_and(|t| t.direction == TrackDirection::Backward) && p4.pz > 0.0 {
            p4.pz = -p4.pz;
        }

        let (theta_x, theta_y) = match track {
            Some(t) => (t.theta_x(), t.theta_y()),
            None => ((p4.px).atan2(p4.pz), (p4.py).atan2(p4.pz)),
        };

        ProtonKinematics {
            four_momentum: p4,
            ekin: p4.e - PROTON_MASS,
            p_cal_correction: p,
            p_dedx: particle.four_momentum.p(),
            start: track.map(|t| t.start).unwrap_or_default(),
            end: track.map(|t| t.end).unwrap_or_default(),
            kinked: track.is_some_and(|t| t.kinked),
            od_matched: track.is_some_and(|t| t.od_matched),
            score: particle.score,
            score1: particle.score1,
            score2: particle.score2,
            chi2_ndf: particle.chi2_ndf,
            pion_score: prong.best(ParticleKind::Pion).map_or(0.0, |p| p.score),
            llr: particle.llr,
            theta: self.beam.theta_wrt_beam(&p4, 0.0).unwrap_or(theta_det),
            theta_x,
            theta_y,
            phi,
        }
    }
}

/// π⁰ from the two reconstructed photons, if both exist.
pub fn pi0_kinematics(shower: &ShowerSummary) -> Option<Pi0Kinematics> {
    let (g1, g2) = (shower.gamma1?, shower.gamma2?);
    let p4 = g1.four_momentum + g2.four_momentum;
    Some(Pi0Kinematics {
        four_momentum: p4,
        inv_mass: p4.mass(),
        gamma1_distance: g1.vertex_distance,
        gamma2_distance: g2.vertex_distance,
        gamma1_energy: g1.four_momentum.e,
        gamma2_energy: g2.four_momentum.e,
    })
}

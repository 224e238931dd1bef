//! Offline replay of persisted records through the full gate sequence.
//!
//! Flag gates read the `Cut_<Name>` flags written online; an absent flag means
//! the event never reached that gate. Kinematic gates are evaluated here from
//! the persisted interpretation, against thresholds that can be changed
//! without rerunning the selection.

use std::sync::Arc;

use nuana_core::kinematics::MEV_TO_GEV;
use nuana_core::record::{EventRecord, Interpretation, SelectionOutcome};
use nuana_core::{Error, Gate, GateKind, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::histogram::{CutHistograms, CutVariable};
use crate::ledger::{CutLedger, ProngCount, RecordTruth, StudyFlag};
use crate::report::CutReport;

/// Thresholds and switches of the replay-only gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Apply `Photon1DistanceLow` and `Photon2DistanceLow`.
    pub apply_photon_distance: bool,
    /// Minimum photon conversion distance (mm).
    pub min_photon_distance: f64,
    /// Apply `Pi0_invMass`.
    pub apply_pi0_inv_mass: bool,
    /// Lower edge of the π⁰ mass window (MeV).
    pub min_pi0_inv_mass: f64,
    /// Upper edge of the π⁰ mass window (MeV).
    pub max_pi0_inv_mass: f64,
    /// Apply `ProtonScore`.
    pub apply_proton_score: bool,
    /// Kinetic energy below which the score difference is used (MeV).
    pub proton_ke_boundary: f64,
    /// Minimum proton score minus pion score for low-KE protons.
    pub min_proton_score_diff: f64,
    /// Minimum proton/pion LLR for high-KE protons.
    pub min_proton_llr: f64,
    /// Apply `DeltaInvMass`.
    pub apply_delta_inv_mass: bool,
    /// Lower edge of the Δ mass window (MeV).
    pub min_delta_inv_mass: f64,
    /// Upper edge of the Δ mass window (MeV).
    pub max_delta_inv_mass: f64,
    /// Apply `beamEnergy`.
    pub apply_beam_energy: bool,
    /// Maximum calorimetric neutrino energy (GeV).
    pub max_beam_energy: f64,
    /// Apply `UnusedE`.
    pub apply_unused_e: bool,
    /// Maximum unused visible energy (MeV).
    pub max_unused_e: f64,
    /// Efficiency baselines of the report.
    pub baselines: [Gate; 2],
    /// Source of the first study flag.
    pub study1: StudyFlag,
    /// Source of the second study flag.
    pub study2: StudyFlag,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            apply_photon_distance: true,
            min_photon_distance: 150.0,
            apply_pi0_inv_mass: true,
            min_pi0_inv_mass: 75.0,
            max_pi0_inv_mass: 195.0,
            apply_proton_score: true,
            proton_ke_boundary: 300.0,
            min_proton_score_diff: 0.45,
            min_proton_llr: 10.0,
            apply_delta_inv_mass: false,
            min_delta_inv_mass: 1000.0,
            max_delta_inv_mass: 1600.0,
            apply_beam_energy: true,
            max_beam_energy: 20.0,
            apply_unused_e: true,
            max_unused_e: 300.0,
            baselines: [Gate::All, Gate::MuonNone],
            study1: StudyFlag::Off,
            study2: StudyFlag::BackgroundWithMichel,
        }
    }
}

impl ReplayConfig {
    /// Check windows and baselines.
    pub fn validate(&self) -> Result<()> {
        let windows = [
            ("pi0 mass", self.min_pi0_inv_mass, self.max_pi0_inv_mass),
            ("delta mass", self.min_delta_inv_mass, self.max_delta_inv_mass),
        ];
        for (what, lo, hi) in windows {
            if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
                return Err(Error::Configuration(format!("{what} window [{lo}, {hi}] is invalid")));
            }
        }
        let limits = [
            ("min_photon_distance", self.min_photon_distance),
            ("proton_ke_boundary", self.proton_ke_boundary),
            ("max_beam_energy", self.max_beam_energy),
            ("max_unused_e", self.max_unused_e),
        ];
        for (what, v) in limits {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::Configuration(format!("{what} must be finite and >= 0, got {v}")));
            }
        }
        if self.baselines[0] > self.baselines[1] {
            return Err(Error::Configuration(format!(
                "baselines out of pipeline order: {} after {}",
                self.baselines[0], self.baselines[1]
            )));
        }
        Ok(())
    }

    /// Switch every replay-only gate on or off.
    pub fn apply_all(mut self, on: bool) -> Self {
        self.apply_photon_distance = on;
        self.apply_pi0_inv_mass = on;
        self.apply_proton_score = on;
        self.apply_delta_inv_mass = on;
        self.apply_beam_energy = on;
        self.apply_unused_e = on;
        self
    }
}

/// Replays records, filling a [`CutLedger`] and [`CutHistograms`].
#[derive(Debug, Clone)]
pub struct Replayer {
    config: ReplayConfig,
    ledger: CutLedger,
    histograms: CutHistograms,
}

impl Replayer {
    /// Replayer reading truth from records and splitting by prong count.
    pub fn new(config: ReplayConfig) -> Result<Self> {
        let resolver = RecordTruth { study1: config.study1, study2: config.study2 };
        let ledger = CutLedger::new(Arc::new(resolver), Arc::new(ProngCount));
        Self::with_ledger(config, ledger)
    }

    /// Replayer counting into `ledger`. Baselines come from `config`.
    pub fn with_ledger(config: ReplayConfig, ledger: CutLedger) -> Result<Self> {
        config.validate()?;
        let ledger = ledger.baselines(config.baselines[0], config.baselines[1]);
        Ok(Self { config, ledger, histograms: CutHistograms::new() })
    }

    /// Thresholds in use.
    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Counters so far.
    pub fn ledger(&self) -> &CutLedger {
        &self.ledger
    }

    /// Histograms so far.
    pub fn histograms(&self) -> &CutHistograms {
        &self.histograms
    }

    /// Cut tables so far.
    pub fn report(&self) -> CutReport {
        self.ledger.write_report()
    }

    /// Split into counters and histograms.
    pub fn into_parts(self) -> (CutLedger, CutHistograms) {
        (self.ledger, self.histograms)
    }

    /// Empty replayer with the same configuration.
    pub fn fork(&self) -> Self {
        Self { config: self.config.clone(), ledger: self.ledger.fork(), histograms: CutHistograms::new() }
    }

    /// Add another replayer's counts.
    pub fn merge(&mut self, other: Replayer) {
        self.histograms += &other.histograms;
        self.ledger += other.ledger;
    }

    /// Run `record` through every gate. `Ok(true)` if it survives all of them.
    ///
    /// Nothing is counted or filled for a record that fails to replay.
    pub fn classify(&mut self, record: &EventRecord) -> Result<bool> {
        if let SelectionOutcome::Refused { refusal } = &record.outcome {
            self.ledger.record_refusal(refusal.label());
            return Ok(false);
        }

        let (trace, passed) = self.trace(record)?;

        let (label, topology) = self.ledger.classify(record);
        let weight = record.truth.as_ref().map_or(1.0, |t| t.info.weight);
        let committed = trace
            .outcomes
            .iter()
            .try_for_each(|&(gate, survived)| self.ledger.record_gate_outcome(gate, survived, record));
        self.ledger.finish_event();
        committed?;
        for (variable, value) in trace.fills {
            self.histograms.fill(variable, topology, &label, value, weight);
        }
        Ok(passed)
    }

    /// Gate outcomes and histogram entries of one record, up to where it stops.
    fn trace(&self, record: &EventRecord) -> Result<(Trace, bool)> {
        let mut trace = Trace::default();
        for gate in Gate::SEQUENCE {
            let survived = match gate.kind() {
                GateKind::Entry => true,
                GateKind::Flag => match record.flags.get(gate) {
                    Some(failed) => !failed,
                    None => {
                        log::trace!("entry {}: stops before {gate}", record.entry);
                        return Ok((trace, false));
                    }
                },
                GateKind::Kinematic => {
                    if gate.multi_prong_only() && record.n_prongs < 2 {
                        true
                    } else {
                        let interp = interpretation(record, gate)?;
                        Self::fill_kinematic(&mut trace, gate, interp, &self.config);
                        Self::passes(&self.config, gate, interp)?
                    }
                }
            };
            Self::fill_flag_gate(&mut trace, gate, record);
            trace.outcomes.push((gate, survived));
            if !survived {
                return Ok((trace, false));
            }
        }
        Ok((trace, true))
    }

    /// Replay records in order.
    pub fn replay<'a, I>(&mut self, records: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        let mut passed = 0;
        for record in records {
            if self.classify(record)? {
                passed += 1;
            }
        }
        Ok(passed)
    }

    /// Replay records on the rayon pool with per-thread replayers, then merge.
    pub fn replay_parallel(&mut self, records: &[EventRecord]) -> Result<u64> {
        let (part, passed) = records
            .par_iter()
            .try_fold(
                || (self.fork(), 0u64),
                |(mut r, n), record| {
                    let pass = r.classify(record)?;
                    Ok::<_, Error>((r, n + u64::from(pass)))
                },
            )
            .try_reduce(
                || (self.fork(), 0u64),
                |(mut a, na), (b, nb)| {
                    a.merge(b);
                    Ok((a, na + nb))
                },
            )?;
        self.merge(part);
        Ok(passed)
    }

    /// Decision of a replay-only gate.
    fn passes(c: &ReplayConfig, gate: Gate, interp: &Interpretation) -> Result<bool> {
        let pass = match gate {
            Gate::Photon1DistanceLow => {
                !c.apply_photon_distance || pi0(interp, gate)?.gamma1_distance >= c.min_photon_distance
            }
            Gate::Photon2DistanceLow => {
                !c.apply_photon_distance || pi0(interp, gate)?.gamma2_distance >= c.min_photon_distance
            }
            Gate::Pi0InvMass => {
                let m = pi0(interp, gate)?.inv_mass;
                !c.apply_pi0_inv_mass || (c.min_pi0_inv_mass..=c.max_pi0_inv_mass).contains(&m)
            }
            Gate::ProtonScore => {
                !c.apply_proton_score
                    || interp.protons.iter().all(|p| {
                        if p.ekin < c.proton_ke_boundary {
                            p.score - p.pion_score >= c.min_proton_score_diff
                        } else {
                            p.llr >= c.min_proton_llr
                        }
                    })
            }
            Gate::DeltaInvMass => {
                !c.apply_delta_inv_mass
                    || interp
                        .delta_inv_mass
                        .is_some_and(|m| (c.min_delta_inv_mass..=c.max_delta_inv_mass).contains(&m))
            }
            Gate::BeamEnergy => !c.apply_beam_energy || interp.neutrino_e_cal * MEV_TO_GEV <= c.max_beam_energy,
            Gate::UnusedE => !c.apply_unused_e || interp.energy_unused <= c.max_unused_e,
            other => {
                return Err(Error::Computation(format!("{other} is not evaluated from kinematics")));
            }
        };
        Ok(pass)
    }

    fn fill_flag_gate(fill: &mut Trace, gate: Gate, record: &EventRecord) {
        match gate {
            Gate::MuonNone => fill.add(CutVariable::NVertices, f64::from(record.n_vertices)),
            Gate::VertexMichelExist => {
                let michel = [Gate::VertexMichelExist, Gate::EndPointMichelExist, Gate::SecEndPointMichelExist]
                    .into_iter()
                    .any(|g| record.flags.get(g) == Some(true));
                fill.add(CutVariable::Michel, if michel { 1.0 } else { 0.0 });
            }
            Gate::ProtonNone => fill.add(CutVariable::NTracks, f64::from(record.n_tracks)),
            _ => {}
        }
    }

    fn fill_kinematic(fill: &mut Trace, gate: Gate, interp: &Interpretation, config: &ReplayConfig) {
        match gate {
            Gate::Photon1DistanceLow => {
                if let Some(pi0) = &interp.pi0 {
                    fill.add(CutVariable::Gamma1ConvDist, pi0.gamma1_distance);
                }
            }
            Gate::Photon2DistanceLow => {
                if let Some(pi0) = &interp.pi0 {
                    fill.add(CutVariable::Gamma2ConvDist, pi0.gamma2_distance);
                }
            }
            Gate::Pi0InvMass => {
                if let Some(pi0) = &interp.pi0 {
                    fill.add(CutVariable::Pi0InvMass, pi0.inv_mass);
                }
            }
            Gate::ProtonScore => {
                for p in &interp.protons {
                    if p.ekin < config.proton_ke_boundary {
                        fill.add(CutVariable::ProtonScoreDiff, p.score - p.pion_score);
                    } else {
                        fill.add(CutVariable::ProtonScoreLlr, p.llr);
                    }
                }
            }
            Gate::DeltaInvMass => {
                if let Some(m) = interp.delta_inv_mass {
                    fill.add(CutVariable::DeltaInvMass, m);
                }
            }
            Gate::BeamEnergy => fill.add(CutVariable::NeutrinoE, interp.neutrino_e_cal * MEV_TO_GEV),
            Gate::UnusedE => fill.add(CutVariable::UnusedE, interp.energy_unused),
            _ => {}
        }
    }
}

/// What one record would add to the ledger and the histograms.
#[derive(Debug, Default)]
struct Trace {
    outcomes: Vec<(Gate, bool)>,
    fills: Vec<(CutVariable, f64)>,
}

impl Trace {
    fn add(&mut self, variable: CutVariable, value: f64) {
        self.fills.push((variable, value));
    }
}

fn interpretation(record: &EventRecord, gate: Gate) -> Result<&Interpretation> {
    record.interpretation.as_ref().filter(|i| !i.is_placeholder()).ok_or_else(|| {
        Error::Validation(format!(
            "run {} subrun {} gate {}: reached {gate} without an interpretation",
            record.run, record.subrun, record.gate
        ))
    })
}

fn pi0(interp: &Interpretation, gate: Gate) -> Result<&nuana_core::record::Pi0Kinematics> {
    interp
        .pi0
        .as_ref()
        .ok_or_else(|| Error::Validation(format!("reached {gate} without a reconstructed pi0")))
}

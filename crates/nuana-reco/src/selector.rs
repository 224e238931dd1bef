//! Online event selector.
//!
//! Gates run strictly in [`Gate::SEQUENCE`] order. Each evaluated gate writes
//! its `Cut_<Name>` flag; the chain stops at the first failure, so every flag
//! after it stays absent. Integrity problems abandon the event without a
//! physics decision and never abort the run.

use std::sync::Arc;

use nuana_core::event::{Event, Particle, Prong};
use nuana_core::kinematics::{BeamFrame, Point3};
use nuana_core::record::{EventRecord, Interpretation, SelectionOutcome, TruthRecord};
use nuana_core::traits::{
    Calorimetry, FiducialVolume, MichelFinder, MuonCandidate, MuonFinder, PlaneLocator, Plausibility,
    ProtonCandidate, ProtonFinder,
};
use nuana_core::{Error, Flags, Gate, Refusal, Result, Vertex};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::config::SelectorConfig;
use crate::interpret::{Interpreter, Selected};
use crate::tools::{
    ClusterMichelFinder, DedxProtonFinder, HexagonalVolume, MinosMatchedMuonFinder, PlaneTable,
    ScaledCalorimetry, TruthMatchPlausibility,
};

/// Where the chain stopped.
#[derive(Debug, Clone, PartialEq)]
enum Stop {
    Failed(Gate),
    Refused(Refusal),
}

/// Where a decay electron was found on a hadron prong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MichelSite {
    EndPoint,
    Secondary,
}

/// Per-event state threaded through the gates.
struct Chain<'e> {
    event: &'e Event,
    flags: Flags,
    truth: Option<TruthRecord>,
}

impl<'e> Chain<'e> {
    fn new(event: &'e Event) -> Self {
        Self { event, flags: Flags::new(), truth: event.truth.clone().map(TruthRecord::new) }
    }

    /// Write the flag and stop on failure.
    fn gate(&mut self, gate: Gate, failed: bool) -> std::result::Result<(), Stop> {
        self.flags.set(gate, failed);
        if failed { Err(Stop::Failed(gate)) } else { Ok(()) }
    }

    /// Fail `gate` when `value` is absent.
    fn require<T>(&mut self, gate: Gate, value: Option<T>) -> std::result::Result<T, Stop> {
        self.flags.set(gate, value.is_none());
        value.ok_or(Stop::Failed(gate))
    }

    fn refuse(&self, refusal: Refusal) -> Stop {
        log_refusal(self.event, &refusal);
        Stop::Refused(refusal)
    }
}

fn log_refusal(event: &Event, refusal: &Refusal) {
    log::error!(
        "run {} subrun {} gate {}: event abandoned: {}",
        event.run,
        event.subrun,
        event.gate,
        refusal
    );
}

/// The online selector.
pub struct EventSelector {
    config: SelectorConfig,
    beam: BeamFrame,
    smear: [Normal<f64>; 3],
    volume: Arc<dyn FiducialVolume>,
    muons: Arc<dyn MuonFinder>,
    michels: Arc<dyn MichelFinder>,
    protons: Arc<dyn ProtonFinder>,
    plausibility: Arc<dyn Plausibility>,
    interpreter: Interpreter,
}

impl EventSelector {
    /// Start building a selector.
    pub fn builder(config: SelectorConfig) -> SelectorBuilder {
        SelectorBuilder::new(config)
    }

    /// Selector wired to the reference tools in [`crate::tools`].
    pub fn with_reference_tools(config: SelectorConfig) -> Result<Self> {
        Self::builder(config)
            .fiducial_volume(Arc::new(HexagonalVolume))
            .plane_locator(Arc::new(PlaneTable::new()))
            .muon_finder(Arc::new(MinosMatchedMuonFinder))
            .michel_finder(Arc::new(ClusterMichelFinder::default()))
            .proton_finder(Arc::new(DedxProtonFinder))
            .calorimetry(Arc::new(ScaledCalorimetry::default()))
            .plausibility(Arc::new(TruthMatchPlausibility))
            .build()
    }

    /// Options in use.
    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Beam frame used for angles.
    pub fn beam(&self) -> BeamFrame {
        self.beam
    }

    /// Run the gate chain over one event and build its record.
    pub fn select(&self, event: &Event) -> EventRecord {
        let mut chain = Chain::new(event);
        let result = self.run_chain(&mut chain);

        let (outcome, interpretation) = match result {
            Ok(selected) => match self.interpreter.interpret(event, &selected) {
                Ok(interp) => (SelectionOutcome::Passed, Some(interp)),
                Err(refusal) => {
                    log_refusal(event, &refusal);
                    (SelectionOutcome::Refused { refusal }, None)
                }
            },
            Err(Stop::Failed(gate)) => {
                log::debug!("run {} gate {}: failed {}", event.run, event.gate, gate);
                let placeholder = self.config.store_all_events.then(|| Interpretation::placeholder(gate));
                (SelectionOutcome::Failed { gate }, placeholder)
            }
            Err(Stop::Refused(refusal)) => (SelectionOutcome::Refused { refusal }, None),
        };

        EventRecord {
            run: event.run,
            subrun: event.subrun,
            gate: event.gate,
            entry: event.entry(),
            n_prongs: event.n_prongs(),
            n_vertices: event.n_vertices,
            n_tracks: event.n_tracks(),
            flags: chain.flags,
            outcome,
            interpretation,
            truth: chain.truth,
        }
    }

    fn run_chain(&self, chain: &mut Chain<'_>) -> std::result::Result<Selected, Stop> {
        self.check_objects(chain)?;
        let vertex = self.check_vertex(chain)?;
        let (muon_prong, muon) = self.check_muon(chain)?;
        self.check_michels(chain, &vertex, muon_prong)?;
        let protons = self.check_protons(chain, muon_prong)?;
        self.check_shower(chain)?;
        Ok(Selected { vertex, muon_prong, muon, protons })
    }

    fn check_objects(&self, chain: &mut Chain<'_>) -> std::result::Result<(), Stop> {
        let event = chain.event;
        let good = !event.has_bad_object();
        if let Some(truth) = chain.truth.as_mut() {
            truth.reco.has_good_objects = good;
        }
        if !good {
            log::debug!("run {} gate {}: refused, bad object", event.run, event.gate);
            return Err(Stop::Refused(Refusal::BadObject));
        }
        if event.is_mc() && self.config.do_plausibility_cuts && !self.plausibility.truth_is_plausible(event)
        {
            log::debug!("run {} gate {}: refused, implausible truth", event.run, event.gate);
            return Err(Stop::Refused(Refusal::ImplausibleTruth));
        }
        Ok(())
    }

    fn check_vertex(&self, chain: &mut Chain<'_>) -> std::result::Result<Vertex, Stop> {
        let event = chain.event;
        chain.gate(Gate::VertexNone, !event.has_interaction_vertex)?;

        let Some(vertex) = event.vertex else {
            chain.flags.set(Gate::VertexNull, true);
            if let Some(truth) = chain.truth.as_mut() {
                truth.reco.has_good_objects = false;
            }
            return Err(chain.refuse(Refusal::Integrity("interaction vertex reference is empty".into())));
        };
        chain.gate(Gate::VertexNull, false)?;
        if let Some(truth) = chain.truth.as_mut() {
            truth.reco.is_good_vertex = true;
        }

        let pos = vertex.position;
        chain.gate(Gate::VertexNotAnalyzable, !self.volume.is_inside(&pos, &self.config.analyzable))?;

        if event.is_mc() && !pos.is_finite() {
            return Err(chain.refuse(Refusal::Integrity("vertex position is NaN".into())));
        }

        let fiducial = self.volume.is_inside(&pos, &self.config.fiducial);
        if let Some(truth) = chain.truth.as_mut() {
            let smeared = self.smeared(&pos, event.entry());
            truth.reco.is_fid_vol = fiducial;
            truth.reco.is_fid_vol_smeared = self.volume.is_inside(&smeared, &self.config.fiducial);
        }
        chain.gate(Gate::VertexNotFiducial, !fiducial)?;
        Ok(vertex)
    }

    /// Vertex smeared with the detector resolution, reproducible per event.
    fn smeared(&self, pos: &Point3, entry: u64) -> Point3 {
        let mut rng = StdRng::seed_from_u64(self.config.seed.wrapping_add(entry));
        let [sx, sy, sz] = &self.smear;
        Point3::new(pos.x + sx.sample(&mut rng), pos.y + sy.sample(&mut rng), pos.z + sz.sample(&mut rng))
    }

    fn check_muon(&self, chain: &mut Chain<'_>) -> std::result::Result<(usize, Particle), Stop> {
        let event = chain.event;
        let candidate = self.muons.find_muon(event);
        if let Some(truth) = chain.truth.as_mut() {
            truth.reco.is_minos_match = candidate.is_some();
        }
        let MuonCandidate { prong: index, particle } = chain.require(Gate::MuonNone, candidate)?;

        let Some(prong) = event.prongs.get(index) else {
            return Err(chain.refuse(Refusal::Integrity(format!("muon prong index {index} out of range"))));
        };
        let Some(muon) = particle else {
            return Err(chain.refuse(Refusal::Integrity("muon prong has an empty particle reference".into())));
        };

        let implausible = event.is_mc()
            && self.config.do_plausibility_cuts
            && !self.plausibility.muon_is_plausible(event, prong);
        chain.gate(Gate::MuonNotPlausible, implausible)?;
        chain.gate(Gate::MuonScoreLow, !(muon.score >= self.config.min_muon_score))?;
        chain.gate(Gate::MuonCharge, prong.minos_qp.is_some_and(|qp| qp > 0.0))?;
        Ok((index, muon))
    }

    /// Primary prongs other than the muon.
    fn hadron_prongs<'a>(event: &'a Event, muon_prong: usize) -> impl Iterator<Item = (usize, &'a Prong)> {
        event.prongs.iter().enumerate().filter(move |(i, p)| *i != muon_prong && p.is_primary)
    }

    fn check_michels(
        &self,
        chain: &mut Chain<'_>,
        vertex: &Vertex,
        muon_prong: usize,
    ) -> std::result::Result<(), Stop> {
        let event = chain.event;
        chain.gate(Gate::VertexMichelExist, self.michels.find_at_vertex(event, vertex).is_some())?;

        let found = Self::hadron_prongs(event, muon_prong).find_map(|(_, p)| self.prong_michel(event, p));
        chain.gate(Gate::EndPointMichelExist, found == Some(MichelSite::EndPoint))?;
        chain.gate(Gate::SecEndPointMichelExist, found == Some(MichelSite::Secondary))?;
        Ok(())
    }

    /// Michel on one prong: its last track's end first, then its intermediate vertices.
    fn prong_michel(&self, event: &Event, prong: &Prong) -> Option<MichelSite> {
        let end = prong.tracks.last()?.end;
        if self.michels.find_at_point(event, &end).is_some() {
            return Some(MichelSite::EndPoint);
        }
        if prong.tracks.len() < 2 {
            return None;
        }
        prong
            .tracks
            .iter()
            .flat_map(|t| t.intermediate_vertices.iter())
            .any(|point| self.michels.find_at_point(event, point).is_some())
            .then_some(MichelSite::Secondary)
    }

    fn check_protons(
        &self,
        chain: &mut Chain<'_>,
        muon_prong: usize,
    ) -> std::result::Result<Vec<ProtonCandidate>, Stop> {
        let event = chain.event;
        if event.n_prongs() < 2 {
            chain.gate(Gate::ProtonNone, false)?;
            chain.gate(Gate::ProtonBad, false)?;
            return Ok(Vec::new());
        }

        let prongs: Vec<usize> = Self::hadron_prongs(event, muon_prong)
            .filter(|(_, p)| self.config.make_short_tracks || !p.is_short_only())
            .map(|(i, _)| i)
            .collect();
        let mut candidates = self.protons.find_protons(event, &prongs);
        chain.gate(Gate::ProtonNone, candidates.is_empty())?;

        candidates.retain(|c| c.particle.score > self.config.min_proton_score);
        chain.gate(Gate::ProtonBad, candidates.is_empty())?;
        Ok(candidates)
    }

    fn check_shower(&self, chain: &mut Chain<'_>) -> std::result::Result<(), Stop> {
        let shower = chain.event.shower.unwrap_or_default();
        chain.gate(Gate::PreFilterPi0, shower.prefilter_rejected)?;
        chain.gate(Gate::ConeBlobs, !shower.has_two_photons())?;
        chain.gate(Gate::BlobDirectionBad, shower.blob_direction_bad)?;
        Ok(())
    }
}

/// Builder injecting the selector's collaborators.
pub struct SelectorBuilder {
    config: SelectorConfig,
    volume: Option<Arc<dyn FiducialVolume>>,
    planes: Option<Arc<dyn PlaneLocator>>,
    muons: Option<Arc<dyn MuonFinder>>,
    michels: Option<Arc<dyn MichelFinder>>,
    protons: Option<Arc<dyn ProtonFinder>>,
    calorimetry: Option<Arc<dyn Calorimetry>>,
    plausibility: Option<Arc<dyn Plausibility>>,
}

impl SelectorBuilder {
    /// Builder with no tools attached.
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            volume: None,
            planes: None,
            muons: None,
            michels: None,
            protons: None,
            calorimetry: None,
            plausibility: None,
        }
    }

    /// Fiducial volume lookup.
    pub fn fiducial_volume(mut self, tool: Arc<dyn FiducialVolume>) -> Self {
        self.volume = Some(tool);
        self
    }

    /// Nearest-plane lookup.
    pub fn plane_locator(mut self, tool: Arc<dyn PlaneLocator>) -> Self {
        self.planes = Some(tool);
        self
    }

    /// Muon identification.
    pub fn muon_finder(mut self, tool: Arc<dyn MuonFinder>) -> Self {
        self.muons = Some(tool);
        self
    }

    /// Michel search.
    pub fn michel_finder(mut self, tool: Arc<dyn MichelFinder>) -> Self {
        self.michels = Some(tool);
        self
    }

    /// Proton identification.
    pub fn proton_finder(mut self, tool: Arc<dyn ProtonFinder>) -> Self {
        self.protons = Some(tool);
        self
    }

    /// Calorimetric correction.
    pub fn calorimetry(mut self, tool: Arc<dyn Calorimetry>) -> Self {
        self.calorimetry = Some(tool);
        self
    }

    /// Truth plausibility.
    pub fn plausibility(mut self, tool: Arc<dyn Plausibility>) -> Self {
        self.plausibility = Some(tool);
        self
    }

    /// Validate options and check that every tool is present.
    pub fn build(self) -> Result<EventSelector> {
        self.config.validate()?;
        let volume = required(self.volume, "fiducial volume")?;
        let planes = required(self.planes, "plane locator")?;
        let muons = required(self.muons, "muon finder")?;
        let michels = required(self.michels, "michel finder")?;
        let protons = required(self.protons, "proton finder")?;
        let calorimetry = required(self.calorimetry, "calorimetry")?;
        let plausibility = required(self.plausibility, "plausibility")?;

        let s = self.config.vertex_smear;
        let normal = |sigma: f64| {
            Normal::new(0.0, sigma)
                .map_err(|e| Error::Configuration(format!("vertex smear sigma {sigma}: {e}")))
        };
        let smear = [normal(s.x)?, normal(s.y)?, normal(s.z)?];

        let beam = BeamFrame { angle: self.config.beam_angle };
        let interpreter = Interpreter::new(planes, calorimetry)
            .beam(beam)
            .beam_angle_bias(self.config.beam_angle_bias)
            .max_proton_slots(self.config.max_proton_slots);

        Ok(EventSelector {
            config: self.config,
            beam,
            smear,
            volume,
            muons,
            michels,
            protons,
            plausibility,
            interpreter,
        })
    }
}

fn required<T: ?Sized>(tool: Option<Arc<T>>, what: &str) -> Result<Arc<T>> {
    tool.ok_or_else(|| Error::Configuration(format!("no {what} configured")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nuana_core::event::{ParticleKind, Track};
    use nuana_core::kinematics::FourMomentum;

    fn selector() -> EventSelector {
        EventSelector::with_reference_tools(SelectorConfig::default()).unwrap()
    }

    fn muon_prong(score: f64) -> Prong {
        Prong::new(0)
            .with_minos_qp(-0.001)
            .with_track(Track::between(Point3::new(0.0, 0.0, 6500.0), Point3::new(0.0, 100.0, 8000.0)))
            .with_particle(Particle::new(ParticleKind::Muon, score, FourMomentum::new(0.0, 80.0, 1500.0, 1506.0)))
    }

    fn vertex() -> Vertex {
        Vertex::at(Point3::new(10.0, -20.0, 6500.0))
    }

    #[test]
    fn missing_tool_is_configuration_error() {
        let err = EventSelector::builder(SelectorConfig::default())
            .fiducial_volume(Arc::new(HexagonalVolume))
            .build();
        assert!(matches!(err, Err(Error::Configuration(_))));
    }

    #[test]
    fn no_vertex_stops_at_first_gate() {
        let rec = selector().select(&Event::new(1, 1, 1));
        assert_eq!(rec.outcome, SelectionOutcome::Failed { gate: Gate::VertexNone });
        assert_eq!(rec.flags.evaluated(), vec![Gate::VertexNone]);
        assert_eq!(rec.flags.get(Gate::VertexNone), Some(true));
    }

    #[test]
    fn null_vertex_is_refused_and_flagged() {
        let mut ev = Event::new(1, 1, 1);
        ev.has_interaction_vertex = true;
        let rec = selector().select(&ev);
        assert!(matches!(rec.outcome, SelectionOutcome::Refused { refusal: Refusal::Integrity(_) }));
        assert_eq!(rec.flags.get(Gate::VertexNull), Some(true));
        assert!(rec.interpretation.is_none());
    }

    #[test]
    fn bad_object_writes_no_flag() {
        let mut ev = Event::new(1, 1, 1).with_vertex(vertex());
        ev.bad_object = true;
        let rec = selector().select(&ev);
        assert_eq!(rec.outcome, SelectionOutcome::Refused { refusal: Refusal::BadObject });
        assert!(rec.flags.is_empty());
    }

    #[test]
    fn store_all_controls_placeholder() {
        let ev = Event::new(1, 1, 1);
        let rec = selector().select(&ev);
        assert_eq!(rec.interpretation.unwrap().failed_gate, Some(Gate::VertexNone));

        let strict =
            EventSelector::with_reference_tools(SelectorConfig::default().store_all_events(false)).unwrap();
        assert!(strict.select(&ev).interpretation.is_none());
    }

    #[test]
    fn muon_score_threshold_is_inclusive() {
        let sel = EventSelector::with_reference_tools(SelectorConfig::default().min_muon_score(0.95)).unwrap();
        let ev = Event::new(1, 1, 1).with_vertex(vertex()).with_prong(muon_prong(0.95));
        let rec = sel.select(&ev);
        assert_eq!(rec.flags.get(Gate::MuonScoreLow), Some(false));
    }

    #[test]
    fn nan_muon_score_fails() {
        let ev = Event::new(1, 1, 1).with_vertex(vertex()).with_prong(muon_prong(f64::NAN));
        let rec = selector().select(&ev);
        assert_eq!(rec.outcome, SelectionOutcome::Failed { gate: Gate::MuonScoreLow });
        assert_eq!(rec.flags.get(Gate::MuonScoreLow), Some(true));
    }

    #[test]
    fn anti_muon_fails_charge() {
        let mut prong = muon_prong(0.99);
        prong.minos_qp = Some(0.002);
        let ev = Event::new(1, 1, 1).with_vertex(vertex()).with_prong(prong);
        let rec = selector().select(&ev);
        assert_eq!(rec.outcome, SelectionOutcome::Failed { gate: Gate::MuonCharge });
    }

    #[test]
    fn single_prong_passes_proton_gates_and_needs_photons() {
        let ev = Event::new(1, 1, 1).with_vertex(vertex()).with_prong(muon_prong(0.99));
        let rec = selector().select(&ev);
        assert_eq!(rec.flags.get(Gate::ProtonNone), Some(false));
        assert_eq!(rec.flags.get(Gate::ProtonBad), Some(false));
        assert_eq!(rec.flags.get(Gate::PreFilterPi0), Some(false));
        assert_eq!(rec.outcome, SelectionOutcome::Failed { gate: Gate::ConeBlobs });
    }

    #[test]
    fn smearing_is_reproducible() {
        let sel = selector();
        let a = sel.smeared(&Point3::new(0.0, 0.0, 6000.0), 42);
        let b = sel.smeared(&Point3::new(0.0, 0.0, 6000.0), 42);
        assert_eq!(a, b);
        let c = sel.smeared(&Point3::new(0.0, 0.0, 6000.0), 43);
        assert_ne!(a, c);
    }
}

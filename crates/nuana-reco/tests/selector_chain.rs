use approx::assert_relative_eq;
use nuana_core::event::{
    EnergySummary, Event, MichelCluster, Particle, ParticleKind, Photon, Prong, ShowerSummary, Track,
    Vertex,
};
use nuana_core::kinematics::{FourMomentum, MUON_MASS, Point3};
use nuana_core::record::SelectionOutcome;
use nuana_core::truth::{PDG_NU_MU, TruthCategory, TruthInfo};
use nuana_core::{Gate, GateKind, Refusal};
use nuana_reco::{EventSelector, SelectorConfig};

fn signal_truth(vertex: Point3) -> TruthInfo {
    TruthInfo {
        current: 1,
        neutrino_pdg: PDG_NU_MU,
        int_type: 2,
        vertex,
        n_proton: 1,
        n_pi0: 1,
        n_pi_charged: 0,
        n_other_mesons: 0,
        has_michel: false,
        plausible: true,
        weight: 1.0,
    }
}

fn muon_prong(score: f64) -> Prong {
    let (py, pz) = (50.0, 2000.0);
    let e = (py * py + pz * pz + MUON_MASS * MUON_MASS).sqrt();
    Prong::new(0)
        .with_minos_qp(-1.0 / 2000.0)
        .with_track(Track::between(Point3::new(0.0, 0.0, 6500.0), Point3::new(0.0, 40.0, 8200.0)))
        .with_particle(Particle::new(ParticleKind::Muon, score, FourMomentum::new(0.0, py, pz, e)))
}

fn proton_prong(score: f64) -> Prong {
    let mut proton = Particle::new(ParticleKind::Proton, score, FourMomentum::new(0.0, 200.0, 400.0, 1100.0));
    proton.llr = 25.0;
    let mut prong = Prong::new(1)
        .with_track(Track::between(Point3::new(0.0, 0.0, 6500.0), Point3::new(0.0, 100.0, 6700.0)))
        .with_particle(proton)
        .with_particle(Particle::new(ParticleKind::Pion, 0.1, FourMomentum::default()));
    prong.visible_energy = 20.0;
    prong
}

fn photons() -> ShowerSummary {
    let (s, c) = 38f64.to_radians().sin_cos();
    ShowerSummary {
        prefilter_rejected: false,
        blob_direction_bad: false,
        gamma1: Some(Photon {
            four_momentum: FourMomentum::new(150.0 * s, 0.0, 150.0 * c, 150.0),
            vertex_distance: 300.0,
        }),
        gamma2: Some(Photon {
            four_momentum: FourMomentum::new(-80.0 * s, 0.0, 80.0 * c, 80.0),
            vertex_distance: 250.0,
        }),
    }
}

/// Simulated signal event that passes every online gate.
fn signal_event(entry: u64) -> Event {
    let pos = Point3::new(0.0, 0.0, 6500.0);
    let mut ev = Event::new(10, 1, entry as u32)
        .with_vertex(Vertex::at(pos))
        .with_prong(muon_prong(0.95))
        .with_prong(proton_prong(0.8))
        .with_shower(photons())
        .with_truth(signal_truth(pos));
    ev.entry = Some(entry);
    ev.energy = EnergySummary { used: 600.0, unused: 100.0 };
    ev
}

fn selector(config: SelectorConfig) -> EventSelector {
    EventSelector::with_reference_tools(config).unwrap()
}

fn assert_prefix(ev: &Event, sel: &EventSelector) {
    let rec = sel.select(ev);
    let last = match &rec.outcome {
        SelectionOutcome::Passed => Gate::BlobDirectionBad,
        SelectionOutcome::Failed { gate } => *gate,
        SelectionOutcome::Refused { .. } => return,
    };
    let expected: Vec<Gate> = Gate::SEQUENCE[1..=last.index()].to_vec();
    assert_eq!(rec.flags.evaluated(), expected, "outcome {:?}", rec.outcome);
    assert_eq!(rec.flags.first_failure(), rec.outcome.failed_gate());
}

#[test]
fn signal_event_passes_and_is_interpreted() {
    let rec = selector(SelectorConfig::default()).select(&signal_event(0));
    assert_eq!(rec.outcome, SelectionOutcome::Passed);
    assert!(rec.flags.first_failure().is_none());
    assert!(Gate::SEQUENCE.iter().filter(|g| g.kind() == GateKind::Kinematic).all(|&g| !rec.flags.is_set(g)));

    let interp = rec.interpretation.unwrap();
    assert_eq!(interp.protons.len(), 1);
    let pi0 = interp.pi0.unwrap();
    assert_relative_eq!(pi0.inv_mass, 134.9, epsilon = 0.5);
    assert!(interp.delta_inv_mass.unwrap() > 1000.0);
    assert_eq!(interp.energy_unused, 100.0);
    let expected_enu = interp.muon.unwrap().four_momentum.e + pi0.four_momentum.e + interp.protons[0].ekin;
    assert_relative_eq!(interp.neutrino_e_cal, expected_enu, epsilon = 1e-9);

    let truth = rec.truth.unwrap();
    assert_eq!(truth.category, TruthCategory::Signal);
    assert!(truth.reco.is_fid_vol);
    assert!(truth.reco.is_minos_match);
    assert!(truth.reco.has_good_objects);
}

#[test]
fn signal_outside_fiducial_keeps_smeared_flag() {
    let sel = selector(SelectorConfig::default());
    let mut any_smeared_inside = false;
    for entry in 0..64 {
        let mut ev = signal_event(entry);
        let edge = Point3::new(0.0, 0.0, 5985.0);
        ev.vertex = Some(Vertex::at(edge));
        let rec = sel.select(&ev);

        assert_eq!(rec.outcome, SelectionOutcome::Failed { gate: Gate::VertexNotFiducial });
        assert_eq!(
            rec.flags.evaluated(),
            vec![Gate::VertexNone, Gate::VertexNull, Gate::VertexNotAnalyzable, Gate::VertexNotFiducial]
        );
        let truth = rec.truth.unwrap();
        assert!(!truth.reco.is_fid_vol);
        any_smeared_inside |= truth.reco.is_fid_vol_smeared;
    }
    // 5 mm outside with σ_z = 10 mm: some smeared vertices land inside.
    assert!(any_smeared_inside);
}

#[test]
fn low_score_proton_is_found_then_filtered() {
    let mut ev = signal_event(1);
    ev.prongs[1] = proton_prong(0.05);
    let rec = selector(SelectorConfig::default()).select(&ev);

    assert_eq!(rec.flags.get(Gate::ProtonNone), Some(false));
    assert_eq!(rec.flags.get(Gate::ProtonBad), Some(true));
    assert_eq!(rec.outcome, SelectionOutcome::Failed { gate: Gate::ProtonBad });
    assert!(!rec.flags.is_set(Gate::PreFilterPi0));
}

#[test]
fn two_prongs_without_proton_hypothesis_fail_proton_none() {
    let mut ev = signal_event(2);
    ev.prongs[1].particles.retain(|p| p.kind != ParticleKind::Proton);
    let rec = selector(SelectorConfig::default()).select(&ev);
    assert_eq!(rec.outcome, SelectionOutcome::Failed { gate: Gate::ProtonNone });
    assert!(!rec.flags.is_set(Gate::ProtonBad));
}

#[test]
fn short_track_prongs_can_be_excluded() {
    let mut ev = signal_event(3);
    ev.prongs[1].tracks[0].kind = nuana_core::event::TrackKind::Short;
    let with_short = selector(SelectorConfig::default()).select(&ev);
    assert_eq!(with_short.outcome, SelectionOutcome::Passed);

    let without = selector(SelectorConfig::default().make_short_tracks(false)).select(&ev);
    assert_eq!(without.outcome, SelectionOutcome::Failed { gate: Gate::ProtonNone });
}

#[test]
fn muon_score_threshold() {
    let sel = selector(SelectorConfig::default());

    let pass = sel.select(&signal_event(4));
    assert_eq!(pass.flags.get(Gate::MuonScoreLow), Some(false));

    let mut ev = signal_event(4);
    ev.prongs[0] = muon_prong(0.85);
    let fail = sel.select(&ev);
    assert_eq!(fail.outcome, SelectionOutcome::Failed { gate: Gate::MuonScoreLow });
    assert_eq!(fail.flags.get(Gate::MuonScoreLow), Some(true));
    for g in &Gate::SEQUENCE[Gate::MuonCharge.index()..] {
        assert!(!fail.flags.is_set(*g), "{g} should be absent");
    }
}

#[test]
fn implausible_muon_has_its_own_flag() {
    let mut ev = signal_event(5);
    ev.prongs[0].plausible = false;
    let rec = selector(SelectorConfig::default()).select(&ev);
    assert_eq!(rec.outcome, SelectionOutcome::Failed { gate: Gate::MuonNotPlausible });

    let relaxed = selector(SelectorConfig::default().do_plausibility_cuts(false)).select(&ev);
    assert_eq!(relaxed.flags.get(Gate::MuonNotPlausible), Some(false));
}

#[test]
fn implausible_truth_is_refused() {
    let mut ev = signal_event(6);
    if let Some(t) = ev.truth.as_mut() {
        t.plausible = false;
    }
    let rec = selector(SelectorConfig::default()).select(&ev);
    assert_eq!(rec.outcome, SelectionOutcome::Refused { refusal: Refusal::ImplausibleTruth });
    assert!(rec.flags.is_empty());
}

#[test]
fn null_muon_reference_abandons_only_that_event() {
    let sel = selector(SelectorConfig::default());
    let mut bad = signal_event(7);
    bad.prongs[0].null_reference = true;
    let rec = sel.select(&bad);
    assert!(matches!(rec.outcome, SelectionOutcome::Refused { refusal: Refusal::Integrity(_) }));
    assert_eq!(rec.flags.get(Gate::MuonNone), Some(false));

    assert_eq!(sel.select(&signal_event(8)).outcome, SelectionOutcome::Passed);
}

#[test]
fn michel_vetoes_in_order() {
    let sel = selector(SelectorConfig::default());

    let mut at_vertex = signal_event(9);
    at_vertex.michel_clusters.push(MichelCluster { position: Point3::new(0.0, 30.0, 6520.0), energy: 25.0, delay: 1500.0 });
    assert_eq!(sel.select(&at_vertex).outcome, SelectionOutcome::Failed { gate: Gate::VertexMichelExist });

    let mut at_end = signal_event(10);
    at_end.michel_clusters.push(MichelCluster { position: Point3::new(0.0, 110.0, 6710.0), energy: 25.0, delay: 1500.0 });
    assert_eq!(sel.select(&at_end).outcome, SelectionOutcome::Failed { gate: Gate::EndPointMichelExist });

    let mut secondary = signal_event(11);
    let mut kinked = secondary.prongs[1].tracks[0].clone();
    kinked.start = Point3::new(0.0, 100.0, 6700.0);
    kinked.end = Point3::new(0.0, 300.0, 6900.0);
    secondary.prongs[1].tracks[0].intermediate_vertices.push(Point3::new(0.0, 50.0, 6600.0));
    secondary.prongs[1].tracks.push(kinked);
    secondary.michel_clusters.push(MichelCluster { position: Point3::new(0.0, 55.0, 6610.0), energy: 25.0, delay: 1500.0 });
    assert_eq!(sel.select(&secondary).outcome, SelectionOutcome::Failed { gate: Gate::SecEndPointMichelExist });
}

/// Signal event with a kinked proton carrying a Michel at its kink and a
/// second hadron prong carrying a Michel at its end.
fn two_michel_event(entry: u64, kinked_first: bool) -> Event {
    let mut ev = signal_event(entry);
    let mut kinked = proton_prong(0.8);
    let mut tail = kinked.tracks[0].clone();
    tail.start = Point3::new(0.0, 100.0, 6700.0);
    tail.end = Point3::new(0.0, 300.0, 6900.0);
    kinked.tracks[0].intermediate_vertices.push(Point3::new(0.0, 50.0, 6600.0));
    kinked.tracks.push(tail);

    let mut stopped = proton_prong(0.8);
    stopped.id = 2;
    stopped.tracks[0] = Track::between(Point3::new(0.0, 0.0, 6500.0), Point3::new(0.0, -100.0, 6700.0));

    ev.prongs.truncate(1);
    if kinked_first {
        ev.prongs.extend([kinked, stopped]);
    } else {
        ev.prongs.extend([stopped, kinked]);
    }
    ev.michel_clusters.push(MichelCluster { position: Point3::new(0.0, 55.0, 6610.0), energy: 25.0, delay: 1500.0 });
    ev.michel_clusters.push(MichelCluster { position: Point3::new(0.0, -110.0, 6710.0), energy: 25.0, delay: 1500.0 });
    ev
}

#[test]
fn michel_search_finishes_each_prong_before_the_next() {
    let sel = selector(SelectorConfig::default());

    let rec = sel.select(&two_michel_event(30, true));
    assert_eq!(rec.outcome, SelectionOutcome::Failed { gate: Gate::SecEndPointMichelExist });
    assert_eq!(rec.flags.get(Gate::EndPointMichelExist), Some(false));
    assert_eq!(rec.flags.get(Gate::SecEndPointMichelExist), Some(true));

    let rec = sel.select(&two_michel_event(31, false));
    assert_eq!(rec.outcome, SelectionOutcome::Failed { gate: Gate::EndPointMichelExist });
    assert_eq!(rec.flags.get(Gate::SecEndPointMichelExist), None);
}

#[test]
fn only_last_track_end_is_a_michel_end_point() {
    let sel = selector(SelectorConfig::default());
    let mut ev = two_michel_event(32, true);
    ev.prongs.truncate(2);
    ev.michel_clusters = vec![MichelCluster { position: Point3::new(0.0, 105.0, 6705.0), energy: 25.0, delay: 1500.0 }];
    // The cluster sits on the first track's end, which is also the tail's start.
    let rec = sel.select(&ev);
    assert_eq!(rec.flags.get(Gate::EndPointMichelExist), Some(false));
}

#[test]
fn shower_flags_come_from_upstream() {
    let sel = selector(SelectorConfig::default());

    let mut prefilter = signal_event(12);
    if let Some(s) = prefilter.shower.as_mut() {
        s.prefilter_rejected = true;
    }
    assert_eq!(sel.select(&prefilter).outcome, SelectionOutcome::Failed { gate: Gate::PreFilterPi0 });

    let mut direction = signal_event(13);
    if let Some(s) = direction.shower.as_mut() {
        s.blob_direction_bad = true;
    }
    assert_eq!(sel.select(&direction).outcome, SelectionOutcome::Failed { gate: Gate::BlobDirectionBad });
}

#[test]
fn evaluated_flags_are_always_a_prefix() {
    let sel = selector(SelectorConfig::default());
    let mut events = vec![Event::new(1, 1, 1), signal_event(20)];

    let mut outside = signal_event(21);
    outside.vertex = Some(Vertex::at(Point3::new(0.0, 0.0, 9000.0)));
    events.push(outside);

    let mut no_muon = signal_event(22);
    no_muon.prongs[0].minos_qp = None;
    events.push(no_muon);

    let mut low = signal_event(23);
    low.prongs[0] = muon_prong(0.5);
    events.push(low);

    let mut no_shower = signal_event(24);
    no_shower.shower = None;
    events.push(no_shower);

    for ev in &events {
        assert_prefix(ev, &sel);
    }
}

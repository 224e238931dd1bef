use approx::assert_relative_eq;
use nuana_core::event::{EnergySummary, Event, Particle, ParticleKind, Photon, Prong, ShowerSummary, Track, Vertex};
use nuana_core::kinematics::{FourMomentum, MUON_MASS, Point3};
use nuana_core::record::{EventRecord, SelectionOutcome};
use nuana_core::truth::{PDG_NU_MU, TruthInfo};
use nuana_core::{Gate, GateKind};
use nuana_cuts::{CutVariable, ReplayConfig, Replayer, Slice, Topology};
use nuana_reco::{EventSelector, SelectorConfig};

fn truth(vertex: Point3, current: i32, n_pi0: u32, n_pi_charged: u32) -> TruthInfo {
    TruthInfo {
        current,
        neutrino_pdg: PDG_NU_MU,
        int_type: 2,
        vertex,
        n_proton: 1,
        n_pi0,
        n_pi_charged,
        n_other_mesons: 0,
        has_michel: n_pi_charged > 0,
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

fn photons(distance: f64) -> ShowerSummary {
    let (s, c) = 38f64.to_radians().sin_cos();
    ShowerSummary {
        prefilter_rejected: false,
        blob_direction_bad: false,
        gamma1: Some(Photon {
            four_momentum: FourMomentum::new(150.0 * s, 0.0, 150.0 * c, 150.0),
            vertex_distance: distance,
        }),
        gamma2: Some(Photon {
            four_momentum: FourMomentum::new(-80.0 * s, 0.0, 80.0 * c, 80.0),
            vertex_distance: 250.0,
        }),
    }
}

/// Simulated event passing every online gate; truth varies with `entry`.
fn mc_event(entry: u64) -> Event {
    let pos = Point3::new(0.0, 0.0, 6500.0);
    let info = match entry % 3 {
        0 => truth(pos, 1, 1, 0),
        1 => truth(pos, 2, 1, 0),
        _ => truth(pos, 1, 0, 1),
    };
    let mut ev = Event::new(10, 1, entry as u32)
        .with_vertex(Vertex::at(pos))
        .with_prong(muon_prong(0.95))
        .with_prong(proton_prong(0.8))
        .with_shower(photons(300.0))
        .with_truth(info);
    ev.entry = Some(entry);
    ev.energy = EnergySummary { used: 600.0, unused: 100.0 };
    ev
}

/// Mixed sample exercising every stopping point.
fn sample(n: u64) -> Vec<Event> {
    (0..n)
        .map(|i| {
            let mut ev = mc_event(i);
            match i % 11 {
                0 => ev = Event::new(10, 1, i as u32),
                1 => ev.vertex = Some(Vertex::at(Point3::new(0.0, 0.0, 5985.0))),
                2 => ev.prongs[0] = muon_prong(0.5),
                3 => ev.prongs[1] = proton_prong(0.05),
                4 => {
                    ev.prongs.truncate(1);
                }
                5 => ev.shower = Some(photons(100.0)),
                6 => ev.energy.unused = 500.0,
                7 => ev.bad_object = true,
                8 => ev.shower = None,
                _ => {}
            }
            ev.entry = Some(i);
            ev
        })
        .collect()
}

fn select_all(events: &[Event]) -> Vec<EventRecord> {
    let selector = EventSelector::with_reference_tools(SelectorConfig::default()).unwrap();
    events.iter().map(|ev| selector.select(ev)).collect()
}

fn replay(records: &[EventRecord], config: ReplayConfig) -> Replayer {
    let mut replayer = Replayer::new(config).unwrap();
    replayer.replay(records).unwrap();
    replayer
}

#[test]
fn event_without_vertex_is_counted_in_all_only() {
    let records = select_all(&[Event::new(1, 1, 1)]);
    assert_eq!(records[0].flags.evaluated(), vec![Gate::VertexNone]);

    let r = replay(&records, ReplayConfig::default());
    let all = r.ledger().table(Topology::All);
    assert_eq!(all.counter(Gate::All).total, 1);
    assert_eq!(all.counter(Gate::All).data, 1);
    assert_eq!(all.counter(Gate::VertexNone).rejected, 1);
    assert!(all.counters[Gate::VertexNone.index()..].iter().all(|c| c.total == 0));
}

#[test]
fn signal_outside_fiducial_counted_through_analyzable() {
    let mut ev = mc_event(0);
    ev.vertex = Some(Vertex::at(Point3::new(0.0, 0.0, 5985.0)));
    let records = select_all(&[ev]);
    assert!(records[0].truth.as_ref().is_some_and(|t| !t.reco.is_fid_vol));

    let r = replay(&records, ReplayConfig::default());
    let all = r.ledger().table(Topology::All);
    for gate in [Gate::All, Gate::VertexNone, Gate::VertexNull, Gate::VertexNotAnalyzable] {
        assert_eq!(all.counter(gate).signal, 1, "{gate}");
    }
    assert_eq!(all.counter(Gate::VertexNotFiducial).signal, 0);
    assert_eq!(all.counter(Gate::VertexNotFiducial).rejected, 1);
}

#[test]
fn counters_are_monotonic_and_consistent() {
    let records = select_all(&sample(220));
    let r = replay(&records, ReplayConfig::default());
    for topology in Topology::ALL {
        let table = r.ledger().table(topology);
        assert!(table.is_monotonic(), "{topology:?}");
        assert!(table.is_consistent(), "{topology:?}");
        for pair in table.counters.windows(2) {
            assert_eq!(pair[0].total, pair[1].total + pair[1].rejected + stopped_between(&records, topology, pair[1].gate));
        }
    }
    assert_eq!(r.ledger().refusals().get("BadObject"), Some(&20));
}

/// Records in `topology` that reached the gate before `gate` but carry no flag for `gate`.
fn stopped_between(records: &[EventRecord], topology: Topology, gate: Gate) -> u64 {
    if gate.kind() != GateKind::Flag {
        return 0;
    }
    records
        .iter()
        .filter(|r| !r.is_refused())
        .filter(|r| match topology {
            Topology::All => true,
            Topology::OneTrack => r.n_prongs == 1,
            Topology::TwoTrack => r.n_prongs >= 2,
        })
        .filter(|r| {
            let reached_previous = Gate::SEQUENCE[..gate.index()]
                .iter()
                .filter(|g| g.kind() == GateKind::Flag)
                .all(|&g| r.flags.get(g) == Some(false));
            reached_previous && !r.flags.is_set(gate)
        })
        .count() as u64
}

#[test]
fn replay_is_idempotent() {
    let records = select_all(&sample(110));
    let a = replay(&records, ReplayConfig::default());
    let b = replay(&records, ReplayConfig::default());
    assert_eq!(a.ledger(), b.ledger());
    assert_eq!(a.histograms(), b.histograms());
    assert_eq!(a.report(), b.report());
}

#[test]
fn replay_agrees_with_online_outcome() {
    let records = select_all(&sample(110));
    let mut r = Replayer::new(ReplayConfig::default().apply_all(false)).unwrap();
    for record in &records {
        let survived = r.classify(record).unwrap();
        assert_eq!(survived, record.outcome.passed(), "{:?}", record.outcome);
    }

    let all = r.ledger().table(Topology::All);
    let failed_at = |gate: Gate| {
        records.iter().filter(|rec| rec.outcome.failed_gate() == Some(gate)).count() as u64
    };
    for gate in Gate::SEQUENCE.iter().copied().filter(|g| g.kind() == GateKind::Flag) {
        assert_eq!(all.counter(gate).rejected, failed_at(gate), "{gate}");
    }
    let passed = records.iter().filter(|rec| rec.outcome.passed()).count() as u64;
    assert_eq!(all.counter(Gate::UnusedE).total, passed);
}

#[test]
fn replay_gates_reject_on_persisted_kinematics() {
    let records = select_all(&sample(110));
    let r = replay(&records, ReplayConfig::default());
    let all = r.ledger().table(Topology::All);

    // Leading photon at 100 mm and 500 MeV of unused energy.
    assert_eq!(all.counter(Gate::Photon1DistanceLow).rejected, 10);
    assert_eq!(all.counter(Gate::UnusedE).rejected, 10);
    assert_eq!(all.counter(Gate::Pi0InvMass).rejected, 0);

    let pi0 = r.histograms().get(CutVariable::Pi0InvMass, Topology::All, Slice::All);
    assert_eq!(pi0.entries, all.counter(Gate::Photon2DistanceLow).total);

    let tight = ReplayConfig { min_pi0_inv_mass: 140.0, ..ReplayConfig::default() };
    let t = replay(&records, tight);
    assert_eq!(t.ledger().counter(Topology::All, Gate::Pi0InvMass).total, 0);
}

#[test]
fn second_photon_filled_only_after_first_photon_passes() {
    let records = select_all(&sample(110));
    let r = replay(&records, ReplayConfig::default());
    let all = r.ledger().table(Topology::All);

    let gamma1 = r.histograms().get(CutVariable::Gamma1ConvDist, Topology::All, Slice::All);
    let gamma2 = r.histograms().get(CutVariable::Gamma2ConvDist, Topology::All, Slice::All);
    let reached = all.counter(Gate::BlobDirectionBad).total;
    assert_eq!(gamma1.entries, reached);
    assert_eq!(gamma2.entries, all.counter(Gate::Photon1DistanceLow).total);
    assert_eq!(gamma1.entries - gamma2.entries, all.counter(Gate::Photon1DistanceLow).rejected);
}

#[test]
fn single_prong_events_skip_multi_prong_gates() {
    let mut ev = mc_event(0);
    ev.prongs.truncate(1);
    let records = select_all(&[ev]);
    assert_eq!(records[0].outcome, SelectionOutcome::Passed);

    let tight = ReplayConfig { apply_delta_inv_mass: true, min_delta_inv_mass: 5000.0, max_delta_inv_mass: 6000.0, ..ReplayConfig::default() };
    let r = replay(&records, tight);
    let one = r.ledger().table(Topology::OneTrack);
    assert_eq!(one.counter(Gate::DeltaInvMass).total, 1);
    assert_eq!(one.counter(Gate::UnusedE).total, 1);
    assert_eq!(r.ledger().table(Topology::TwoTrack).counter(Gate::All).total, 0);
}

#[test]
fn efficiencies_never_exceed_one_hundred() {
    let records = select_all(&sample(220));
    let report = replay(&records, ReplayConfig::default()).report();
    for table in &report.tables {
        for row in &table.rows {
            for value in [row.eff_first, row.eff_second, row.purity].into_iter().flatten() {
                assert!((0.0..=100.0).contains(&value), "{} {value}", row.gate);
            }
        }
        assert_relative_eq!(table.row(Gate::All).eff_first.unwrap_or(100.0), 100.0);
    }
    let text = report.to_string();
    assert!(text.contains("Eff(Muon_None)"));
    assert!(text.contains("1Track events"));
}

#[test]
fn parallel_replay_matches_sequential() {
    let records = select_all(&sample(330));
    let sequential = replay(&records, ReplayConfig::default());

    let mut parallel = Replayer::new(ReplayConfig::default()).unwrap();
    let passed = parallel.replay_parallel(&records).unwrap();

    assert_eq!(parallel.ledger(), sequential.ledger());
    assert_eq!(parallel.histograms(), sequential.histograms());
    assert_eq!(passed, sequential.ledger().counter(Topology::All, Gate::UnusedE).total);
}

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use nuana_core::event::{EnergySummary, Event, Particle, ParticleKind, Photon, Prong, ShowerSummary, Track, Vertex};
use nuana_core::kinematics::{FourMomentum, Point3};
use nuana_core::record::EventRecord;
use nuana_cuts::{ReplayConfig, Replayer};
use nuana_reco::{EventSelector, SelectorConfig};
use std::hint::black_box;

fn event(entry: u64) -> Event {
    let pos = Point3::new(0.0, 0.0, 6500.0 + (entry % 500) as f64);
    let muon = Prong::new(0)
        .with_minos_qp(-0.0005)
        .with_track(Track::between(pos, Point3::new(0.0, 40.0, 8200.0)))
        .with_particle(Particle::new(
            ParticleKind::Muon,
            0.8 + 0.2 * ((entry % 7) as f64 / 6.0),
            FourMomentum::new(0.0, 50.0, 2000.0, 2003.5),
        ));
    let mut proton = Prong::new(1)
        .with_track(Track::between(pos, Point3::new(0.0, 100.0, pos.z + 200.0)))
        .with_particle(Particle::new(ParticleKind::Proton, 0.6, FourMomentum::new(0.0, 200.0, 400.0, 1100.0)));
    proton.visible_energy = 20.0;
    let (s, c) = 38f64.to_radians().sin_cos();
    let shower = ShowerSummary {
        prefilter_rejected: false,
        blob_direction_bad: entry % 13 == 0,
        gamma1: Some(Photon {
            four_momentum: FourMomentum::new(150.0 * s, 0.0, 150.0 * c, 150.0),
            vertex_distance: 100.0 + (entry % 400) as f64,
        }),
        gamma2: Some(Photon { four_momentum: FourMomentum::new(-80.0 * s, 0.0, 80.0 * c, 80.0), vertex_distance: 250.0 }),
    };
    let mut ev = Event::new(1, 1, entry as u32).with_vertex(Vertex::at(pos)).with_prong(muon).with_shower(shower);
    if entry % 2 == 0 {
        ev = ev.with_prong(proton);
    }
    ev.entry = Some(entry);
    ev.energy = EnergySummary { used: 600.0, unused: (entry % 600) as f64 };
    ev
}

fn records(n: u64) -> Vec<EventRecord> {
    let selector = EventSelector::with_reference_tools(SelectorConfig::default()).expect("selector");
    (0..n).map(|i| selector.select(&event(i))).collect()
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay");

    for n in [1_000u64, 10_000, 100_000] {
        let recs = records(n);
        group.bench_with_input(BenchmarkId::new("sequential", n), &recs, |b, recs| {
            b.iter(|| {
                let mut r = Replayer::new(ReplayConfig::default()).expect("config");
                black_box(r.replay(recs).expect("replay"))
            })
        });
        group.bench_with_input(BenchmarkId::new("parallel", n), &recs, |b, recs| {
            b.iter(|| {
                let mut r = Replayer::new(ReplayConfig::default()).expect("config");
                black_box(r.replay_parallel(recs).expect("replay"))
            })
        });
    }

    group.finish();
}

fn bench_select(c: &mut Criterion) {
    let selector = EventSelector::with_reference_tools(SelectorConfig::default()).expect("selector");
    let events: Vec<Event> = (0..10_000).map(event).collect();
    c.bench_function("select_10k", |b| {
        b.iter(|| {
            for ev in &events {
                black_box(selector.select(ev));
            }
        })
    });
}

criterion_group!(benches, bench_replay, bench_select);
criterion_main!(benches);

use cpt_experiment::{
    score, score_by_condition, CalibrationConfig, ExperimentConfig, Runner, Session, SessionLog,
    SimulatedSubject, SubjectProfile,
};
use cpt_timing::ManualClock;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn uncalibrated() -> ExperimentConfig {
    ExperimentConfig {
        calibration: CalibrationConfig {
            required_for_test: false,
            require_checklist: false,
            ..CalibrationConfig::default()
        },
        ..ExperimentConfig::default()
    }
}

fn finished_log() -> SessionLog {
    let mut session = Session::seeded(uncalibrated(), 1).unwrap();
    let mut subject = SimulatedSubject::new(SubjectProfile::default(), StdRng::seed_from_u64(2));
    Runner::new(ManualClock::new())
        .run(&mut session, &mut subject)
        .unwrap();
    session.log().iter().cloned().collect()
}

pub fn bench_full_session(c: &mut Criterion) {
    let mut g = c.benchmark_group("session");
    g.sample_size(50);

    g.bench_function("simulated_80_trials", |b| {
        b.iter_batched(
            || {
                (
                    Session::seeded(uncalibrated(), 7).unwrap(),
                    SimulatedSubject::new(SubjectProfile::default(), StdRng::seed_from_u64(8)),
                )
            },
            |(mut session, mut subject)| {
                let result = Runner::new(ManualClock::new()).run(&mut session, &mut subject);
                black_box(result)
            },
            BatchSize::SmallInput,
        )
    });

    g.finish();
}

pub fn bench_scoring(c: &mut Criterion) {
    let log = finished_log();
    let mut g = c.benchmark_group("scoring");

    g.bench_function("score", |b| b.iter(|| score(black_box(&log), black_box(120.0))));
    g.bench_function("by_condition", |b| {
        b.iter(|| score_by_condition(black_box(&log), black_box(120.0)))
    });

    g.finish();
}

criterion_group!(benches, bench_full_session, bench_scoring);
criterion_main!(benches);

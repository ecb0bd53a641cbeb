use std::collections::HashSet;

use cpt_core::{Classification, EngineError, SchedulerPhase, StimulusType, BLOCK_SPECS};
use cpt_experiment::{
    CalibrationConfig, ExperimentConfig, Interpretation, Runner, SchedulerEffect, Session,
    SessionEvent, SimulatedSubject, SubjectProfile,
};
use cpt_timing::ManualClock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn subject(profile: SubjectProfile, seed: u64) -> SimulatedSubject<StdRng> {
    SimulatedSubject::new(profile, StdRng::seed_from_u64(seed))
}

fn steady(mean_rt_ms: f64) -> SubjectProfile {
    SubjectProfile {
        hit_rate: 1.0,
        commission_rate: 0.0,
        mean_rt_ms,
        rt_jitter_ms: 0.0,
        stray_press_rate: 0.0,
        anticipation_rate: 0.0,
        ..SubjectProfile::default()
    }
}

fn calibrated_session(config: ExperimentConfig, seed: u64) -> (Session, Runner<ManualClock>) {
    let mut session = Session::seeded(config, seed).unwrap();
    let mut runner = Runner::new(ManualClock::new());
    runner
        .calibrate(&mut session, &mut subject(SubjectProfile::default(), seed ^ 0xCA1))
        .unwrap();
    (session, runner)
}

#[test]
fn full_session_upholds_log_invariants() {
    let (mut session, mut runner) = calibrated_session(ExperimentConfig::default(), 2024);
    let result = runner
        .run(&mut session, &mut subject(SubjectProfile::default(), 7))
        .unwrap();

    assert_eq!(session.phase(), SchedulerPhase::Complete);
    assert_eq!(result.raw_log, session.log().to_vec());
    assert!(result.raw_log.len() <= 80);

    let mut seen = HashSet::new();
    for r in &result.raw_log {
        assert!((1..=8).contains(&r.block_number), "block {}", r.block_number);
        assert!(r.trial_number < 10);
        assert!(seen.insert((r.block_number, r.trial_number)), "trial logged twice");

        let condition = BLOCK_SPECS[r.block_number as usize - 1];
        assert_eq!(r.has_visual_distractor, condition.visual_distractor);
        assert_eq!(r.has_auditory_distractor, condition.auditory_distractor);

        match r.classification {
            Classification::Miss => {
                assert_eq!(r.stimulus_type, StimulusType::Target);
                assert_eq!(r.response_ms, None);
                assert_eq!(r.corrected_reaction_time_ms, None);
            }
            Classification::Hit => assert_eq!(r.stimulus_type, StimulusType::Target),
            Classification::Commission => assert_eq!(r.stimulus_type, StimulusType::NonTarget),
            Classification::TimingError => {}
        }
        if let (Some(raw), Some(corrected)) =
            (r.raw_reaction_time_ms(), r.corrected_reaction_time_ms)
        {
            let offset = session.calibration().offset_ms();
            assert!((raw - offset - corrected).abs() < 1e-9);
        }
    }

    let tally = session.log().tally();
    assert_eq!(tally.hits + tally.misses, tally.targets);
    assert!(tally.commissions <= tally.non_targets);

    for metric in [result.attentiveness, result.impulsivity, result.hyperactivity] {
        assert!((0.0..=100.0).contains(&metric), "metric {metric}");
    }
}

#[test]
fn seeded_sessions_replay_identically() {
    let run = || {
        let (mut session, mut runner) = calibrated_session(ExperimentConfig::default(), 99);
        runner
            .run(&mut session, &mut subject(SubjectProfile::default(), 100))
            .unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn calibration_offset_is_rounded_mean_of_samples() {
    let (session, _) = calibrated_session(ExperimentConfig::default(), 31);
    let samples = session.calibration().samples();
    assert_eq!(samples.len(), 5);
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    assert_eq!(session.calibration().offset_ms(), mean.round());
}

#[test]
fn steady_responder_scores_offset_corrected_latency() {
    let config = ExperimentConfig {
        target_probability: 1.0,
        ..ExperimentConfig::default()
    };
    let mut session = Session::seeded(config, 5).unwrap();
    let mut runner = Runner::new(ManualClock::new());
    let offset = runner.calibrate(&mut session, &mut subject(steady(250.0), 1)).unwrap();
    assert_eq!(offset, 250.0);

    let result = runner.run(&mut session, &mut subject(steady(400.0), 2)).unwrap();
    assert_eq!(result.raw_log.len(), 80);
    assert_eq!(result.attentiveness, 100.0);
    assert!((result.timeliness - 150.0).abs() < 1e-6);
    assert_eq!(result.impulsivity, 0.0);
    assert_eq!(result.hyperactivity, 0.0);
    assert!(result.raw_log.iter().all(|r| {
        r.corrected_reaction_time_ms
            .is_some_and(|rt| (rt - 150.0).abs() < 1e-6)
    }));

    let reading = Interpretation::from_result(&result);
    assert_eq!(reading.attention_score, 100.0);
    assert_eq!(reading.timeliness_score, 100.0);
}

#[test]
fn absent_subject_misses_every_target() {
    let config = ExperimentConfig {
        target_probability: 1.0,
        ..ExperimentConfig::default()
    };
    let (mut session, mut runner) = calibrated_session(config, 8);
    let idle = SubjectProfile {
        hit_rate: 0.0,
        stray_press_rate: 0.0,
        ..SubjectProfile::default()
    };
    let result = runner.run(&mut session, &mut subject(idle, 9)).unwrap();
    assert_eq!(result.raw_log.len(), 80);
    assert!(result.raw_log.iter().all(|r| r.classification == Classification::Miss));
    assert_eq!(result.attentiveness, 0.0);
    assert_eq!(result.timeliness, 0.0);
}

#[test]
fn pressing_every_non_target_is_full_impulsivity() {
    let config = ExperimentConfig {
        target_probability: 0.0,
        ..ExperimentConfig::default()
    };
    let (mut session, mut runner) = calibrated_session(config, 10);
    let impulsive = SubjectProfile {
        commission_rate: 1.0,
        stray_press_rate: 0.0,
        ..SubjectProfile::default()
    };
    let result = runner.run(&mut session, &mut subject(impulsive, 11)).unwrap();
    assert_eq!(result.raw_log.len(), 80);
    assert_eq!(result.impulsivity, 100.0);
    assert_eq!(result.attentiveness, 0.0, "no targets means zero, not NaN");
    assert_eq!(result.timeliness, 0.0);
}

#[test]
fn stray_presses_after_silent_rejections_are_timing_errors() {
    let config = ExperimentConfig {
        target_probability: 0.0,
        ..ExperimentConfig::default()
    };
    let (mut session, mut runner) = calibrated_session(config, 12);
    let fidgety = SubjectProfile {
        commission_rate: 0.0,
        stray_press_rate: 1.0,
        ..SubjectProfile::default()
    };
    let result = runner.run(&mut session, &mut subject(fidgety, 13)).unwrap();

    // The last trial of each block has no interval before the break.
    assert_eq!(result.raw_log.len(), 8 * 9);
    assert!(result.raw_log.iter().all(|r| {
        r.classification == Classification::TimingError && r.stimulus_type == StimulusType::NonTarget
    }));
    assert_eq!(result.hyperactivity, 100.0);
    assert_eq!(result.impulsivity, 0.0);
}

#[test]
fn short_protocol_from_json() {
    let config = ExperimentConfig::from_json_str(
        r#"{
            "trials_per_block": 3,
            "target_probability": 1.0,
            "blocks": [
                { "visual_distractor": false, "auditory_distractor": false },
                { "visual_distractor": true, "auditory_distractor": true }
            ],
            "calibration": { "required_for_test": false, "require_checklist": false }
        }"#,
    )
    .unwrap();
    let mut session = Session::seeded(config, 4).unwrap();
    let mut runner = Runner::new(ManualClock::new());
    let result = runner.run(&mut session, &mut subject(steady(300.0), 5)).unwrap();

    assert_eq!(result.raw_log.len(), 6);
    assert_eq!(result.timeliness, 300.0, "uncalibrated offset is zero");
    let breakdown = session.condition_breakdown().unwrap();
    assert_eq!(breakdown.len(), 2);
    assert_eq!(breakdown[1].label, "combo");
    assert_eq!(breakdown[1].tally.hits, 3);
}

#[test]
fn result_is_stable_after_completion() {
    let (mut session, mut runner) = calibrated_session(ExperimentConfig::default(), 21);
    let result = runner
        .run(&mut session, &mut subject(SubjectProfile::default(), 22))
        .unwrap();
    assert_eq!(session.result().unwrap(), &result);
    assert_eq!(session.result().unwrap(), &result);
    assert!(session.poll(10_000_000.0).is_empty());
    assert_eq!(session.trial_input(10_000_001.0), Err(EngineError::NotRunning {
        phase: SchedulerPhase::Complete
    }));
}

#[test]
fn test_cannot_start_uncalibrated() {
    let mut session = Session::seeded(ExperimentConfig::default(), 1).unwrap();
    let mut runner = Runner::new(ManualClock::new());
    let err = runner
        .run(&mut session, &mut subject(SubjectProfile::default(), 1))
        .unwrap_err();
    assert!(matches!(err, EngineError::CalibrationIncomplete { .. }));
}

/// Target count of the default protocol for `seed`, drawn in the order the
/// scheduler draws: target flag, then distractor presence and glyph on
/// visual blocks.
fn seeded_target_count(seed: u64) -> usize {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut targets = 0;
    for condition in BLOCK_SPECS {
        for _ in 0..10 {
            if rng.random_bool(0.7) {
                targets += 1;
            }
            if condition.visual_distractor && rng.random_bool(0.3) {
                let _glyph = rng.random_bool(0.5);
            }
        }
    }
    targets
}

#[test]
fn pinned_seed_fixes_target_count_and_attentiveness() {
    const SEED: u64 = 56;
    const HITS: usize = 50;

    let config = ExperimentConfig {
        calibration: CalibrationConfig {
            required_for_test: false,
            require_checklist: false,
            ..CalibrationConfig::default()
        },
        ..ExperimentConfig::default()
    };
    let mut session = Session::seeded(config, SEED).unwrap();
    session.start(0.0).unwrap();

    // Press 300 ms after the first HITS targets, ignore everything else.
    let mut to_hit = HITS;
    let mut now = 0.0;
    while session.phase() != SchedulerPhase::Complete {
        let next = session.next_deadline().unwrap();
        now = if next > now { next } else { now + 0.001 };
        for event in session.poll(now) {
            match event {
                SessionEvent::Scheduler(SchedulerEffect::StimulusShown {
                    stimulus: StimulusType::Target,
                    onset_ms,
                    ..
                }) if to_hit > 0 => {
                    to_hit -= 1;
                    let rec = session.trial_input(onset_ms + 300.0).unwrap().unwrap();
                    assert_eq!(rec.classification, Classification::Hit);
                }
                SessionEvent::Scheduler(SchedulerEffect::BreakStarted { .. }) => {
                    session.resume_from_break(now).unwrap();
                }
                _ => {}
            }
        }
    }

    let targets = seeded_target_count(SEED);
    let tally = session.log().tally();
    assert_eq!(tally.targets, targets);
    assert_eq!(tally.hits, HITS.min(targets));
    assert_eq!(tally.misses, targets - tally.hits);

    let result = session.result().unwrap();
    let expected = 100.0 * tally.hits as f64 / targets as f64;
    assert!((result.attentiveness - expected).abs() < 1e-9);
    assert_eq!(result.timeliness, 300.0);
    assert_eq!(result.impulsivity, 0.0);
}

//! Clock-driven host loop and a scripted subject.
//!
//! [`Runner`] plays the part of the UI: it sleeps until the next timer
//! deadline or press, polls the session, and forwards presses. With a
//! [`cpt_timing::ManualClock`] a full 80-trial session runs instantly and
//! deterministically; with [`cpt_timing::MonotonicClock`] it runs in real
//! time.

use cpt_core::{EngineError, EngineResult, SessionResult};
use cpt_timing::Clock;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calibration::{CalibrationInput, CatchTrialStart};
use crate::scheduler::SchedulerEffect;
use crate::session::{Session, SessionEvent};

/// Behavioural parameters of a simulated subject
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubjectProfile {
    /// Probability of pressing for a target.
    pub hit_rate: f64,
    /// Probability of pressing for a non-target.
    pub commission_rate: f64,
    pub mean_rt_ms: f64,
    /// Reaction times are uniform in `mean ± jitter`.
    pub rt_jitter_ms: f64,
    /// Probability of a stray press during each inter-stimulus interval.
    pub stray_press_rate: f64,
    /// Probability of jumping the gun on a calibration cue.
    pub anticipation_rate: f64,
    pub break_pause_ms: f64,
}

impl Default for SubjectProfile {
    fn default() -> Self {
        Self {
            hit_rate: 0.9,
            commission_rate: 0.15,
            mean_rt_ms: 350.0,
            rt_jitter_ms: 80.0,
            stray_press_rate: 0.05,
            anticipation_rate: 0.1,
            break_pause_ms: 2_000.0,
        }
    }
}

pub struct SimulatedSubject<R: Rng> {
    profile: SubjectProfile,
    rng: R,
}

impl<R: Rng> SimulatedSubject<R> {
    pub fn new(profile: SubjectProfile, rng: R) -> Self {
        Self { profile, rng }
    }

    pub fn profile(&self) -> &SubjectProfile {
        &self.profile
    }

    fn reaction_ms(&mut self) -> f64 {
        let jitter = self.profile.rt_jitter_ms.abs();
        let rt = if jitter > 0.0 {
            self.profile.mean_rt_ms + self.rng.random_range(-jitter..=jitter)
        } else {
            self.profile.mean_rt_ms
        };
        rt.max(1.0)
    }

    fn chance(&mut self, p: f64) -> bool {
        self.rng.random_bool(p.clamp(0.0, 1.0))
    }

    /// Press time for a stimulus shown at `onset_ms`, if the subject presses.
    pub fn react_to_stimulus(&mut self, is_target: bool, onset_ms: f64) -> Option<f64> {
        let p = if is_target {
            self.profile.hit_rate
        } else {
            self.profile.commission_rate
        };
        self.chance(p).then(|| onset_ms + self.reaction_ms())
    }

    /// Press time somewhere inside `[from_ms, from_ms + span_ms)`, if any.
    pub fn stray_press(&mut self, from_ms: f64, span_ms: f64) -> Option<f64> {
        if span_ms <= 0.0 || !self.chance(self.profile.stray_press_rate) {
            return None;
        }
        Some(from_ms + self.rng.random_range(0.0..span_ms))
    }

    /// Press time for a calibration catch trial armed at `armed_ms` whose
    /// cue is due at `cue_due_ms`.
    pub fn react_to_cue(&mut self, armed_ms: f64, cue_due_ms: f64) -> f64 {
        if cue_due_ms > armed_ms && self.chance(self.profile.anticipation_rate) {
            return self.rng.random_range(armed_ms..cue_due_ms);
        }
        cue_due_ms + self.reaction_ms()
    }
}

/// Attempts before calibration gives up on a subject that never waits for
/// the cue.
const MAX_CATCH_TRIALS: usize = 100;

/// Step past a deadline that only fires strictly after it.
const EXCLUSIVE_STEP_MS: f64 = 0.001;

pub struct Runner<C: Clock> {
    clock: C,
}

impl<C: Clock> Runner<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Runs catch trials until calibration completes and ticks the
    /// checklist. Returns the calibration offset.
    pub fn calibrate<R: Rng, S: Rng>(
        &mut self,
        session: &mut Session<R>,
        subject: &mut SimulatedSubject<S>,
    ) -> EngineResult<f64> {
        session.confirm_power(true);
        session.confirm_focus_mode(true);

        for _ in 0..MAX_CATCH_TRIALS {
            let armed_ms = self.clock.now_ms();
            let cue_due_ms = match session.start_catch_trial(armed_ms) {
                CatchTrialStart::Armed { cue_due_ms } => cue_due_ms,
                CatchTrialStart::Disabled => return Ok(session.calibration().offset_ms()),
                CatchTrialStart::AlreadyActive => {
                    return Err(EngineError::InvalidTransition {
                        action: "start a catch trial",
                        phase: session.phase(),
                    })
                }
            };

            let press_ms = subject.react_to_cue(armed_ms, cue_due_ms);
            self.clock.sleep_until(press_ms.min(cue_due_ms));
            session.poll(self.clock.now_ms());
            self.clock.sleep_until(press_ms);

            match session.calibration_input(self.clock.now_ms()) {
                CalibrationInput::Sample {
                    reaction_ms,
                    offset_ms,
                    complete,
                } => {
                    debug!(reaction_ms, offset_ms, "calibration sample");
                    if complete {
                        return Ok(offset_ms);
                    }
                }
                CalibrationInput::TooEarly => debug!("calibration press too early, retrying"),
                CalibrationInput::Ignored => {}
            }
        }
        Err(EngineError::CalibrationIncomplete {
            missing: "reaction calibration",
        })
    }

    /// Runs the whole test with `subject` pressing, resuming every break
    /// after the subject's pause. Returns the scored result.
    pub fn run<R: Rng, S: Rng>(
        &mut self,
        session: &mut Session<R>,
        subject: &mut SimulatedSubject<S>,
    ) -> EngineResult<SessionResult> {
        let window_end_ms = session.config().response_window_ms;
        let isi_ms = session.config().inter_stimulus_interval_ms;
        let mut presses: Vec<f64> = Vec::new();

        session.start(self.clock.now_ms())?;
        loop {
            let now = self.clock.now_ms();
            for event in session.poll(now) {
                let SessionEvent::Scheduler(effect) = event else {
                    continue;
                };
                match effect {
                    SchedulerEffect::StimulusShown {
                        stimulus, onset_ms, ..
                    } => {
                        presses.extend(subject.react_to_stimulus(stimulus.is_target(), onset_ms));
                    }
                    SchedulerEffect::StimulusHidden { at_ms } => {
                        presses.extend(subject.stray_press(at_ms + window_end_ms, isi_ms));
                    }
                    SchedulerEffect::BreakStarted { completed_block } => {
                        presses.clear();
                        let pause_until = now + subject.profile().break_pause_ms;
                        self.clock.sleep_until(pause_until);
                        debug!(completed_block, "subject resumes");
                        session.resume_from_break(self.clock.now_ms())?;
                    }
                    SchedulerEffect::Completed => {
                        let result = session.result()?.clone();
                        info!(records = result.raw_log.len(), "simulated session finished");
                        return Ok(result);
                    }
                    SchedulerEffect::Exited => {
                        return Err(EngineError::NotComplete {
                            phase: session.phase(),
                        })
                    }
                    SchedulerEffect::Countdown { .. } | SchedulerEffect::Logged(_) => {}
                }
            }
            presses.sort_by(f64::total_cmp);

            let due = presses.iter().take_while(|&&t| t <= now).count();
            for press_ms in presses.drain(..due) {
                if !session.phase().allows_input() {
                    continue;
                }
                match session.trial_input(press_ms) {
                    Ok(Some(record)) => {
                        debug!(press_ms, classification = ?record.classification, "press logged")
                    }
                    Ok(None) => {}
                    Err(e) => debug!(press_ms, error = %e, "press dropped"),
                }
            }

            let next = match (session.next_deadline(), presses.first().copied()) {
                (Some(a), Some(b)) => a.min(b),
                (Some(a), None) => a,
                (None, Some(b)) => b,
                (None, None) => {
                    return Err(EngineError::NotComplete {
                        phase: session.phase(),
                    })
                }
            };
            let wake = if next > now { next } else { now + EXCLUSIVE_STEP_MS };
            self.clock.sleep_until(wake);
        }
    }
}

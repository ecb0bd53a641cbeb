//! Reaction-latency calibration.
//!
//! The subject answers a handful of catch cues shown after a random delay.
//! The mean latency estimates the systemic display/input offset that is
//! later subtracted from every reaction time. The mean is untrimmed.

use cpt_timing::TimerSlot;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::CalibrationConfig;

/// Samples and derived offset. `complete` never reverts once set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationState {
    samples: Vec<f64>,
    offset_ms: f64,
    complete: bool,
    pub power_confirmed: bool,
    pub focus_mode_confirmed: bool,
}

impl CalibrationState {
    /// Appends a latency and recomputes the offset as the mean of all
    /// samples, rounded to the nearest millisecond.
    pub fn push_sample(&mut self, reaction_ms: f64, required_samples: usize) {
        self.samples.push(reaction_ms.max(0.0));
        let mean = self.samples.iter().sum::<f64>() / self.samples.len() as f64;
        self.offset_ms = mean.round();
        if self.samples.len() >= required_samples {
            self.complete = true;
        }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// First unmet item of the pre-test checklist, if any.
    pub fn missing_requirement(&self, config: &CalibrationConfig) -> Option<&'static str> {
        if config.required_for_test && !self.complete {
            return Some("reaction calibration");
        }
        if config.require_checklist {
            if !self.power_confirmed {
                return Some("power connection");
            }
            if !self.focus_mode_confirmed {
                return Some("focus mode");
            }
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ShowCue;

#[derive(Debug, Clone, Copy, PartialEq)]
enum CatchTrial {
    Idle,
    Waiting,
    CueVisible { onset_ms: f64 },
    TooEarly,
}

/// Outcome of asking for a new catch trial
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CatchTrialStart {
    Armed { cue_due_ms: f64 },
    /// A catch trial is already waiting or showing its cue.
    AlreadyActive,
    /// Calibration is complete; no more catch trials.
    Disabled,
}

/// Outcome of a press during calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationInput {
    /// Pressed before the cue; the catch trial is void.
    TooEarly,
    Sample {
        reaction_ms: f64,
        offset_ms: f64,
        complete: bool,
    },
    /// No catch trial running.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    config: CalibrationConfig,
    state: CalibrationState,
    trial: CatchTrial,
    timer: TimerSlot<ShowCue>,
}

impl CalibrationEngine {
    pub fn new(config: CalibrationConfig) -> Self {
        Self {
            config,
            state: CalibrationState::default(),
            trial: CatchTrial::Idle,
            timer: TimerSlot::new(),
        }
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut CalibrationState {
        &mut self.state
    }

    pub fn start_catch_trial<R: Rng>(&mut self, now_ms: f64, rng: &mut R) -> CatchTrialStart {
        if self.state.complete {
            return CatchTrialStart::Disabled;
        }
        if matches!(self.trial, CatchTrial::Waiting | CatchTrial::CueVisible { .. }) {
            return CatchTrialStart::AlreadyActive;
        }
        let delay = rng.random_range(self.config.cue_delay_min_ms..self.config.cue_delay_max_ms);
        self.timer.after(now_ms, delay, ShowCue);
        self.trial = CatchTrial::Waiting;
        let cue_due_ms = now_ms + delay;
        debug!(cue_due_ms, "catch trial armed");
        CatchTrialStart::Armed { cue_due_ms }
    }

    /// Reveals the cue once its delay has elapsed. Returns the cue onset.
    pub fn poll(&mut self, now_ms: f64) -> Option<f64> {
        let fired = self.timer.take_due(now_ms)?;
        self.trial = CatchTrial::CueVisible {
            onset_ms: fired.due_ms,
        };
        debug!(onset_ms = fired.due_ms, "catch cue shown");
        Some(fired.due_ms)
    }

    pub fn on_discrete_input(&mut self, now_ms: f64) -> CalibrationInput {
        match self.trial {
            CatchTrial::Waiting => {
                self.timer.clear();
                self.trial = CatchTrial::TooEarly;
                debug!(now_ms, "catch trial void: pressed before cue");
                CalibrationInput::TooEarly
            }
            CatchTrial::CueVisible { onset_ms } => {
                let reaction_ms = now_ms - onset_ms;
                let was_complete = self.state.complete;
                self.state.push_sample(reaction_ms, self.config.required_samples);
                self.trial = CatchTrial::Idle;
                if self.state.complete && !was_complete {
                    info!(
                        samples = self.state.samples.len(),
                        offset_ms = self.state.offset_ms,
                        "calibration complete"
                    );
                }
                CalibrationInput::Sample {
                    reaction_ms,
                    offset_ms: self.state.offset_ms,
                    complete: self.state.complete,
                }
            }
            CatchTrial::Idle | CatchTrial::TooEarly => CalibrationInput::Ignored,
        }
    }

    pub fn cue_visible(&self) -> bool {
        matches!(self.trial, CatchTrial::CueVisible { .. })
    }

    pub fn waiting_for_cue(&self) -> bool {
        matches!(self.trial, CatchTrial::Waiting)
    }

    /// True after a premature press until the next catch trial is started.
    pub fn too_early(&self) -> bool {
        matches!(self.trial, CatchTrial::TooEarly)
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.timer.deadline()
    }

    /// Abandons any running catch trial, keeping recorded samples.
    pub fn cancel(&mut self) {
        self.timer.clear();
        self.trial = CatchTrial::Idle;
    }

    /// Forgets every sample and confirmation.
    pub fn reset(&mut self) {
        self.cancel();
        self.state = CalibrationState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn engine() -> (CalibrationEngine, StdRng) {
        (
            CalibrationEngine::new(CalibrationConfig::default()),
            StdRng::seed_from_u64(7),
        )
    }

    fn react(engine: &mut CalibrationEngine, rng: &mut StdRng, now: f64, rt: f64) -> f64 {
        let CatchTrialStart::Armed { cue_due_ms } = engine.start_catch_trial(now, rng) else {
            panic!("catch trial not armed");
        };
        assert!(cue_due_ms >= now + 1_000.0 && cue_due_ms <= now + 3_000.0);
        assert_eq!(engine.poll(cue_due_ms), Some(cue_due_ms));
        engine.on_discrete_input(cue_due_ms + rt);
        cue_due_ms + rt
    }

    #[test]
    fn five_samples_set_offset_and_complete() {
        let (mut engine, mut rng) = engine();
        let mut now = 0.0;
        for (i, rt) in [200.0, 210.0, 190.0, 205.0, 195.0].into_iter().enumerate() {
            assert!(!engine.state().is_complete(), "complete after {i} samples");
            now = react(&mut engine, &mut rng, now, rt);
        }
        assert_eq!(engine.state().offset_ms(), 200.0);
        assert!(engine.state().is_complete());
        assert_eq!(engine.start_catch_trial(now, &mut rng), CatchTrialStart::Disabled);
    }

    #[test]
    fn too_early_press_voids_the_trial() {
        let (mut engine, mut rng) = engine();
        react(&mut engine, &mut rng, 0.0, 250.0);
        let before = engine.state().clone();

        engine.start_catch_trial(10_000.0, &mut rng);
        assert!(engine.waiting_for_cue());
        assert_eq!(engine.on_discrete_input(10_200.0), CalibrationInput::TooEarly);
        assert!(engine.too_early());
        assert_eq!(engine.next_deadline(), None);
        assert_eq!(engine.poll(20_000.0), None);
        assert_eq!(engine.state(), &before);

        // a retry works normally
        assert!(matches!(
            engine.start_catch_trial(20_000.0, &mut rng),
            CatchTrialStart::Armed { .. }
        ));
    }

    #[test]
    fn idle_press_is_a_no_op() {
        let (mut engine, _) = engine();
        assert_eq!(engine.on_discrete_input(5.0), CalibrationInput::Ignored);
        assert!(engine.state().samples().is_empty());
    }

    #[test]
    fn second_start_while_waiting_is_ignored() {
        let (mut engine, mut rng) = engine();
        let first = engine.start_catch_trial(0.0, &mut rng);
        assert_eq!(engine.start_catch_trial(100.0, &mut rng), CatchTrialStart::AlreadyActive);
        let CatchTrialStart::Armed { cue_due_ms } = first else {
            panic!("first start must arm");
        };
        assert_eq!(engine.next_deadline(), Some(cue_due_ms));
    }

    #[test]
    fn offset_rounds_to_whole_milliseconds() {
        let mut state = CalibrationState::default();
        state.push_sample(200.0, 5);
        state.push_sample(201.0, 5);
        assert_eq!(state.offset_ms(), 201.0);
        state.push_sample(201.0, 5);
        assert_eq!(state.offset_ms(), 201.0);
    }

    #[test]
    fn checklist_reports_first_gap() {
        let config = CalibrationConfig::default();
        let mut state = CalibrationState::default();
        assert_eq!(state.missing_requirement(&config), Some("reaction calibration"));
        for rt in [1.0; 5] {
            state.push_sample(rt, config.required_samples);
        }
        assert_eq!(state.missing_requirement(&config), Some("power connection"));
        state.power_confirmed = true;
        assert_eq!(state.missing_requirement(&config), Some("focus mode"));
        state.focus_mode_confirmed = true;
        assert_eq!(state.missing_requirement(&config), None);
    }

    #[test]
    fn reset_clears_samples() {
        let (mut engine, mut rng) = engine();
        react(&mut engine, &mut rng, 0.0, 180.0);
        engine.state_mut().power_confirmed = true;
        engine.reset();
        assert_eq!(engine.state(), &CalibrationState::default());
    }
}

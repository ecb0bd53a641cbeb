//! Block and trial scheduler.
//!
//! An explicit state machine over [`SchedulerPhase`]. Commands (`start`,
//! `resume_from_break`, `exit`) and timer expiries each perform one
//! transition and report what happened as a list of [`SchedulerEffect`]s.
//! At most one timer is pending at any time. Follow-up timers are armed
//! from the deadline of the timer that fired, not from the poll time, so a
//! host that polls late never stretches the protocol.

use cpt_core::{
    BlockCondition, DistractorKind, EngineError, EngineResult, ResponseRecord, SchedulerPhase,
    StimulusType, TrialState,
};
use cpt_timing::{Expired, TimerSlot};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use crate::classifier::ResponseClassifier;
use crate::config::ExperimentConfig;
use crate::trial::TrialContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerTimer {
    CountdownStep,
    HideStimulus,
    CloseResponseWindow,
    NextTrial,
}

/// Observable outcome of a scheduler transition
#[derive(Debug, Clone, PartialEq)]
pub enum SchedulerEffect {
    Countdown {
        remaining: u32,
    },
    StimulusShown {
        block_number: u32,
        trial_number: u32,
        stimulus: StimulusType,
        distractor: DistractorKind,
        onset_ms: f64,
    },
    StimulusHidden {
        at_ms: f64,
    },
    /// A record the session must append to its log.
    Logged(ResponseRecord),
    BreakStarted {
        completed_block: u32,
    },
    Completed,
    Exited,
}

/// Read-only progress snapshot for the UI
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub block_number: u32,
    pub total_blocks: u32,
    pub trial_number: u32,
    pub trials_per_block: u32,
    pub trials_completed: u32,
    pub total_trials: u32,
}

impl Progress {
    /// Share of the current block already done, in `[0, 1]`.
    pub fn block_fraction(&self) -> f64 {
        let done_in_block = self
            .trials_completed
            .saturating_sub((self.block_number - 1) * self.trials_per_block)
            .min(self.trials_per_block);
        done_in_block as f64 / self.trials_per_block as f64
    }

    pub fn overall_fraction(&self) -> f64 {
        self.trials_completed as f64 / self.total_trials as f64
    }
}

#[derive(Debug, Clone)]
pub struct TrialScheduler {
    config: ExperimentConfig,
    classifier: ResponseClassifier,
    phase: SchedulerPhase,
    block_number: u32,
    trial_number: u32,
    trials_completed: u32,
    countdown_remaining: u32,
    offset_ms: f64,
    current: Option<TrialContext>,
    timer: TimerSlot<SchedulerTimer>,
}

impl TrialScheduler {
    /// `config` is expected to have passed [`ExperimentConfig::validate`].
    pub fn new(config: ExperimentConfig) -> Self {
        let classifier = ResponseClassifier::new(&config);
        Self {
            config,
            classifier,
            phase: SchedulerPhase::Idle,
            block_number: 1,
            trial_number: 0,
            trials_completed: 0,
            countdown_remaining: 0,
            offset_ms: 0.0,
            current: None,
            timer: TimerSlot::new(),
        }
    }

    /// Begins the first countdown. `offset_ms` is the calibration offset
    /// embedded in every record of this run.
    pub fn start(&mut self, now_ms: f64, offset_ms: f64) -> EngineResult<Vec<SchedulerEffect>> {
        if self.phase != SchedulerPhase::Idle {
            return Err(EngineError::InvalidTransition {
                action: "start",
                phase: self.phase,
            });
        }
        self.offset_ms = offset_ms;
        info!(offset_ms, blocks = self.config.total_blocks(), "test started");
        let mut effects = Vec::new();
        self.enter_countdown(now_ms, &mut effects);
        Ok(effects)
    }

    /// Subject-paced continuation after a break.
    pub fn resume_from_break(&mut self, now_ms: f64) -> EngineResult<Vec<SchedulerEffect>> {
        if self.phase != SchedulerPhase::Break {
            return Err(EngineError::InvalidTransition {
                action: "resume from break",
                phase: self.phase,
            });
        }
        debug!(block = self.block_number, "resuming after break");
        let mut effects = Vec::new();
        self.enter_countdown(now_ms, &mut effects);
        Ok(effects)
    }

    /// Halts the run. The pending timer is gone before this returns and
    /// the trial in flight is dropped without a record.
    pub fn exit(&mut self) -> Vec<SchedulerEffect> {
        if self.phase.is_terminal() {
            return Vec::new();
        }
        self.timer.clear();
        let dropped = self.current.take();
        info!(
            phase = %self.phase,
            block = self.block_number,
            dropped_trial = ?dropped.map(|t| t.trial_number),
            "test exited"
        );
        self.phase = SchedulerPhase::Exited;
        vec![SchedulerEffect::Exited]
    }

    /// Back to a fresh idle scheduler.
    pub fn reset(&mut self) {
        *self = Self::new(self.config.clone());
    }

    /// Fires every timer due at `now_ms`, in order.
    pub fn poll<R: Rng>(&mut self, now_ms: f64, rng: &mut R) -> Vec<SchedulerEffect> {
        let mut effects = Vec::new();
        while let Some(fired) = self.timer.take_due(now_ms) {
            self.on_timer(fired, rng, &mut effects);
        }
        effects
    }

    /// Classifies a press against the current trial.
    ///
    /// Returns `Ok(None)` when the trial already has its record; the press
    /// is ignored. A press on a target whose window elapsed before the
    /// close timer was polled yields that target's miss instead, exactly
    /// as if the timer had fired first. Fails when the scheduler is not
    /// running.
    pub fn on_discrete_input(&mut self, now_ms: f64) -> EngineResult<Option<ResponseRecord>> {
        if !self.phase.allows_input() {
            return Err(EngineError::NotRunning { phase: self.phase });
        }
        let trial = self.current.as_mut().ok_or(EngineError::NoActiveTrial)?;
        if trial.response_logged {
            debug!(
                block = trial.block_number,
                trial = trial.trial_number,
                "extra press ignored"
            );
            return Ok(None);
        }
        if trial.is_target
            && trial.reaction_time_ms(now_ms) > self.classifier.response_deadline_ms()
        {
            trial.response_logged = true;
            debug!(
                block = trial.block_number,
                trial = trial.trial_number,
                "target window elapsed before press, miss"
            );
            return Ok(Some(ResponseRecord::miss(
                trial.block_number,
                trial.trial_number,
                trial.stimulus_onset_ms,
                trial.condition,
                trial.distractor,
            )));
        }
        let record = self.classifier.classify(trial, now_ms, self.offset_ms)?;
        trial.response_logged = true;
        debug!(
            block = record.block_number,
            trial = record.trial_number,
            classification = ?record.classification,
            rt = ?record.raw_reaction_time_ms(),
            "response classified"
        );
        Ok(Some(record))
    }

    fn enter_countdown(&mut self, now_ms: f64, effects: &mut Vec<SchedulerEffect>) {
        self.phase = SchedulerPhase::Countdown;
        self.countdown_remaining = self.config.countdown_steps;
        if self.countdown_remaining == 0 {
            self.timer.after(now_ms, 0.0, SchedulerTimer::CountdownStep);
            return;
        }
        effects.push(SchedulerEffect::Countdown {
            remaining: self.countdown_remaining,
        });
        self.timer
            .after(now_ms, self.config.countdown_step_ms, SchedulerTimer::CountdownStep);
    }

    fn on_timer<R: Rng>(
        &mut self,
        fired: Expired<SchedulerTimer>,
        rng: &mut R,
        effects: &mut Vec<SchedulerEffect>,
    ) {
        let due = fired.due_ms;
        match fired.tag {
            SchedulerTimer::CountdownStep => {
                self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
                if self.countdown_remaining > 0 {
                    effects.push(SchedulerEffect::Countdown {
                        remaining: self.countdown_remaining,
                    });
                    self.timer
                        .after(due, self.config.countdown_step_ms, SchedulerTimer::CountdownStep);
                } else {
                    self.phase = SchedulerPhase::Running;
                    info!(block = self.block_number, condition = self.condition().label(), "block running");
                    self.begin_trial(due, rng, effects);
                }
            }
            SchedulerTimer::HideStimulus => {
                if let Some(trial) = self.current.as_mut() {
                    trial.state = TrialState::ResponseWindow;
                }
                effects.push(SchedulerEffect::StimulusHidden { at_ms: due });
                self.timer.after_exclusive(
                    due,
                    self.config.response_window_ms,
                    SchedulerTimer::CloseResponseWindow,
                );
            }
            SchedulerTimer::CloseResponseWindow => self.close_trial(due, effects),
            SchedulerTimer::NextTrial => {
                self.current = None;
                self.trial_number += 1;
                self.begin_trial(due, rng, effects);
            }
        }
    }

    fn begin_trial<R: Rng>(&mut self, onset_ms: f64, rng: &mut R, effects: &mut Vec<SchedulerEffect>) {
        let condition = self.condition();
        let is_target = rng.random_bool(self.config.target_probability);
        let distractor = if condition.visual_distractor
            && rng.random_bool(self.config.distractor_probability)
        {
            if rng.random_bool(0.5) {
                DistractorKind::VisualA
            } else {
                DistractorKind::VisualB
            }
        } else {
            DistractorKind::None
        };

        let trial = TrialContext::new(
            self.block_number,
            self.trial_number,
            is_target,
            onset_ms,
            distractor,
            condition,
        );
        debug!(
            block = trial.block_number,
            trial = trial.trial_number,
            is_target,
            ?distractor,
            onset_ms,
            "stimulus shown"
        );
        effects.push(SchedulerEffect::StimulusShown {
            block_number: trial.block_number,
            trial_number: trial.trial_number,
            stimulus: trial.stimulus_type(),
            distractor,
            onset_ms,
        });
        self.current = Some(trial);
        self.timer
            .after(onset_ms, self.config.stimulus_duration_ms, SchedulerTimer::HideStimulus);
    }

    fn close_trial(&mut self, closed_at_ms: f64, effects: &mut Vec<SchedulerEffect>) {
        let Some(trial) = self.current.as_mut() else {
            return;
        };
        trial.state = TrialState::InterStimulus;
        if !trial.response_logged && trial.is_target {
            trial.response_logged = true;
            debug!(block = trial.block_number, trial = trial.trial_number, "target missed");
            effects.push(SchedulerEffect::Logged(ResponseRecord::miss(
                trial.block_number,
                trial.trial_number,
                trial.stimulus_onset_ms,
                trial.condition,
                trial.distractor,
            )));
        }
        self.trials_completed += 1;

        if trial.trial_number + 1 < self.config.trials_per_block {
            self.timer.after(
                closed_at_ms,
                self.config.inter_stimulus_interval_ms,
                SchedulerTimer::NextTrial,
            );
            return;
        }

        self.current = None;
        if self.block_number >= self.config.total_blocks() {
            self.phase = SchedulerPhase::Complete;
            info!(trials = self.trials_completed, "all blocks complete");
            effects.push(SchedulerEffect::Completed);
        } else {
            let completed_block = self.block_number;
            self.phase = SchedulerPhase::Break;
            self.block_number += 1;
            self.trial_number = 0;
            info!(completed_block, "block complete, break");
            effects.push(SchedulerEffect::BreakStarted { completed_block });
        }
    }

    fn condition(&self) -> BlockCondition {
        self.config
            .block(self.block_number)
            .unwrap_or(BlockCondition::CLEAN)
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    pub fn block_number(&self) -> u32 {
        self.block_number
    }

    pub fn trial_number(&self) -> u32 {
        self.trial_number
    }

    pub fn offset_ms(&self) -> f64 {
        self.offset_ms
    }

    pub fn current_trial(&self) -> Option<&TrialContext> {
        self.current.as_ref()
    }

    /// For rendering only; classification never looks at this.
    pub fn stimulus_visible(&self) -> bool {
        self.current.as_ref().is_some_and(TrialContext::stimulus_visible)
    }

    pub fn current_stimulus(&self) -> Option<StimulusType> {
        self.current
            .as_ref()
            .filter(|t| t.stimulus_visible())
            .map(TrialContext::stimulus_type)
    }

    pub fn distractor(&self) -> DistractorKind {
        self.current
            .as_ref()
            .map_or(DistractorKind::None, TrialContext::visible_distractor)
    }

    /// Whether the host should play the auditory distractor track.
    pub fn auditory_distractor_active(&self) -> bool {
        self.phase == SchedulerPhase::Running && self.condition().auditory_distractor
    }

    pub fn countdown(&self) -> Option<u32> {
        (self.phase == SchedulerPhase::Countdown && self.countdown_remaining > 0)
            .then_some(self.countdown_remaining)
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.timer.deadline()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            block_number: self.block_number,
            total_blocks: self.config.total_blocks(),
            trial_number: self.trial_number,
            trials_per_block: self.config.trials_per_block,
            trials_completed: self.trials_completed,
            total_trials: self.config.total_trials(),
        }
    }
}

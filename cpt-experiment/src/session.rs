//! One test administration: calibration, scheduler, log and result under a
//! single owner.

use cpt_core::{
    DistractorKind, EngineError, EngineResult, ResponseRecord, SchedulerPhase, SessionResult,
    StimulusType,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::calibration::{CalibrationEngine, CalibrationInput, CalibrationState, CatchTrialStart};
use crate::config::{ConfigError, ExperimentConfig};
use crate::log::SessionLog;
use crate::scheduler::{Progress, SchedulerEffect, TrialScheduler};
use crate::scoring::{score, score_by_condition, ConditionScore};

/// Something the host may want to render or react to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CalibrationCue { onset_ms: f64 },
    Scheduler(SchedulerEffect),
}

pub struct Session<R: Rng = StdRng> {
    config: ExperimentConfig,
    rng: R,
    calibration: CalibrationEngine,
    scheduler: TrialScheduler,
    log: SessionLog,
    result: Option<SessionResult>,
    /// Events fired while catching up on a press, handed out by the next poll.
    pending: Vec<SessionEvent>,
}

impl Session<StdRng> {
    /// Session with a reproducible trial sequence.
    pub fn seeded(config: ExperimentConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::new(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Session<R> {
    pub fn new(config: ExperimentConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            calibration: CalibrationEngine::new(config.calibration.clone()),
            scheduler: TrialScheduler::new(config.clone()),
            config,
            rng,
            log: SessionLog::new(),
            result: None,
            pending: Vec::new(),
        })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    // Calibration

    pub fn start_catch_trial(&mut self, now_ms: f64) -> CatchTrialStart {
        self.calibration.start_catch_trial(now_ms, &mut self.rng)
    }

    pub fn calibration_input(&mut self, now_ms: f64) -> CalibrationInput {
        self.calibration.on_discrete_input(now_ms)
    }

    pub fn calibration(&self) -> &CalibrationState {
        self.calibration.state()
    }

    pub fn calibration_engine(&self) -> &CalibrationEngine {
        &self.calibration
    }

    pub fn confirm_power(&mut self, confirmed: bool) {
        self.calibration.state_mut().power_confirmed = confirmed;
    }

    pub fn confirm_focus_mode(&mut self, confirmed: bool) {
        self.calibration.state_mut().focus_mode_confirmed = confirmed;
    }

    // Test run

    /// Starts the first countdown once the pre-test checklist is met.
    pub fn start(&mut self, now_ms: f64) -> EngineResult<Vec<SessionEvent>> {
        if let Some(missing) = self
            .calibration
            .state()
            .missing_requirement(&self.config.calibration)
        {
            warn!(missing, "test start refused");
            return Err(EngineError::CalibrationIncomplete { missing });
        }
        self.calibration.cancel();
        let offset_ms = self.calibration.state().offset_ms();
        let effects = self.scheduler.start(now_ms, offset_ms)?;
        Ok(self.apply(effects))
    }

    pub fn resume_from_break(&mut self, now_ms: f64) -> EngineResult<Vec<SessionEvent>> {
        let effects = self.scheduler.resume_from_break(now_ms)?;
        Ok(self.apply(effects))
    }

    pub fn exit(&mut self) -> Vec<SessionEvent> {
        self.calibration.cancel();
        self.pending.clear();
        let effects = self.scheduler.exit();
        self.apply(effects)
    }

    /// Advances calibration and the scheduler to `now_ms`.
    pub fn poll(&mut self, now_ms: f64) -> Vec<SessionEvent> {
        let mut events = std::mem::take(&mut self.pending);
        if let Some(onset_ms) = self.calibration.poll(now_ms) {
            events.push(SessionEvent::CalibrationCue { onset_ms });
        }
        let effects = self.scheduler.poll(now_ms, &mut self.rng);
        events.extend(self.apply(effects));
        events
    }

    /// A subject press during the test. Returns the record it produced, or
    /// `None` when the trial already had one.
    ///
    /// Timers due at `now_ms` fire before the press is classified, so the
    /// outcome does not depend on whether the host polled first. Their
    /// events come out of the next [`Session::poll`].
    pub fn trial_input(&mut self, now_ms: f64) -> EngineResult<Option<ResponseRecord>> {
        let effects = self.scheduler.poll(now_ms, &mut self.rng);
        let caught_up = self.apply(effects);
        self.pending.extend(caught_up);

        let record = self.scheduler.on_discrete_input(now_ms).inspect_err(|e| {
            warn!(error = %e, "press rejected");
        })?;
        if let Some(record) = &record {
            self.log.append(record.clone());
        }
        Ok(record)
    }

    fn apply(&mut self, effects: Vec<SchedulerEffect>) -> Vec<SessionEvent> {
        for effect in &effects {
            match effect {
                SchedulerEffect::Logged(record) => self.log.append(record.clone()),
                SchedulerEffect::Completed => {
                    let result = score(&self.log, self.scheduler.offset_ms());
                    info!(
                        attentiveness = result.attentiveness,
                        timeliness = result.timeliness,
                        impulsivity = result.impulsivity,
                        hyperactivity = result.hyperactivity,
                        records = result.raw_log.len(),
                        "session scored"
                    );
                    self.result = Some(result);
                }
                _ => {}
            }
        }
        effects.into_iter().map(SessionEvent::Scheduler).collect()
    }

    /// Earliest pending timer deadline across calibration and scheduler.
    pub fn next_deadline(&self) -> Option<f64> {
        match (self.calibration.next_deadline(), self.scheduler.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // Read-only views

    pub fn phase(&self) -> SchedulerPhase {
        self.scheduler.phase()
    }

    pub fn progress(&self) -> Progress {
        self.scheduler.progress()
    }

    pub fn block_number(&self) -> u32 {
        self.scheduler.block_number()
    }

    pub fn trial_number(&self) -> u32 {
        self.scheduler.trial_number()
    }

    pub fn countdown(&self) -> Option<u32> {
        self.scheduler.countdown()
    }

    pub fn stimulus_visible(&self) -> bool {
        self.scheduler.stimulus_visible()
    }

    pub fn current_stimulus(&self) -> Option<StimulusType> {
        self.scheduler.current_stimulus()
    }

    pub fn distractor(&self) -> DistractorKind {
        self.scheduler.distractor()
    }

    pub fn auditory_distractor_active(&self) -> bool {
        self.scheduler.auditory_distractor_active()
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    /// Final scores; only available once every block has completed.
    pub fn result(&self) -> EngineResult<&SessionResult> {
        self.result.as_ref().ok_or(EngineError::NotComplete {
            phase: self.scheduler.phase(),
        })
    }

    pub fn condition_breakdown(&self) -> EngineResult<Vec<ConditionScore>> {
        self.result()?;
        Ok(score_by_condition(&self.log, self.scheduler.offset_ms()))
    }

    /// Clears the run (log, result, scheduler) but keeps calibration.
    pub fn reset(&mut self) {
        self.scheduler.reset();
        self.log.clear();
        self.result = None;
        self.pending.clear();
    }

    /// Clears the run and calibration.
    pub fn reset_all(&mut self) {
        self.reset();
        self.calibration.reset();
    }
}

use cpt_core::{Classification, EngineError, EngineResult, ResponseRecord};

use crate::config::ExperimentConfig;
use crate::trial::TrialContext;

/// Turns a press into a clinical event.
///
/// A press counts as a response to the stimulus while its latency is at
/// most `stimulus_duration + response_window`; the boundary itself is
/// inside the window. Anything later is a timing error whatever the
/// stimulus was.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseClassifier {
    response_deadline_ms: f64,
}

impl ResponseClassifier {
    pub fn new(config: &ExperimentConfig) -> Self {
        Self {
            response_deadline_ms: config.response_deadline_ms(),
        }
    }

    pub fn response_deadline_ms(&self) -> f64 {
        self.response_deadline_ms
    }

    pub fn classification(&self, is_target: bool, reaction_ms: f64) -> Classification {
        if reaction_ms > self.response_deadline_ms {
            Classification::TimingError
        } else if is_target {
            Classification::Hit
        } else {
            Classification::Commission
        }
    }

    /// Builds the record for a press at `now_ms`. Fails if the trial
    /// already carries a response.
    pub fn classify(
        &self,
        trial: &TrialContext,
        now_ms: f64,
        offset_ms: f64,
    ) -> EngineResult<ResponseRecord> {
        if trial.response_logged {
            return Err(EngineError::AlreadyClassified {
                block: trial.block_number,
                trial: trial.trial_number,
            });
        }
        let rt = trial.reaction_time_ms(now_ms);
        Ok(ResponseRecord::responded(
            trial.block_number,
            trial.trial_number,
            trial.stimulus_type(),
            trial.stimulus_onset_ms,
            now_ms,
            self.classification(trial.is_target, rt),
            offset_ms,
            trial.condition,
            trial.distractor,
        ))
    }
}

use crate::stimulus::{BlockCondition, DistractorKind, StimulusType};
use serde::{Deserialize, Serialize};

/// Stage of the trial currently in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    /// Stimulus (and any distractor) on screen.
    Stimulus,
    /// Stimulus hidden, late responses still count.
    ResponseWindow,
    /// Window closed, waiting out the inter-stimulus interval.
    InterStimulus,
}

/// Clinical classification of a trial outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Hit,
    Miss,
    Commission,
    TimingError,
}

/// One logged trial outcome. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub block_number: u32,
    pub trial_number: u32,
    pub stimulus_type: StimulusType,
    pub stimulus_onset_ms: f64,
    pub response_ms: Option<f64>,
    pub classification: Classification,
    pub corrected_reaction_time_ms: Option<f64>,
    pub has_visual_distractor: bool,
    pub has_auditory_distractor: bool,
    #[serde(default)]
    pub distractor_shown: DistractorKind,
}

impl ResponseRecord {
    /// Record for a press at `response_ms`. The corrected reaction time is
    /// the raw latency minus the calibration offset and may be negative.
    #[allow(clippy::too_many_arguments)]
    pub fn responded(
        block_number: u32,
        trial_number: u32,
        stimulus_type: StimulusType,
        stimulus_onset_ms: f64,
        response_ms: f64,
        classification: Classification,
        offset_ms: f64,
        condition: BlockCondition,
        distractor_shown: DistractorKind,
    ) -> Self {
        Self {
            block_number,
            trial_number,
            stimulus_type,
            stimulus_onset_ms,
            response_ms: Some(response_ms),
            classification,
            corrected_reaction_time_ms: Some(response_ms - stimulus_onset_ms - offset_ms),
            has_visual_distractor: condition.visual_distractor,
            has_auditory_distractor: condition.auditory_distractor,
            distractor_shown,
        }
    }

    /// Record for a target that went unanswered.
    pub fn miss(
        block_number: u32,
        trial_number: u32,
        stimulus_onset_ms: f64,
        condition: BlockCondition,
        distractor_shown: DistractorKind,
    ) -> Self {
        Self {
            block_number,
            trial_number,
            stimulus_type: StimulusType::Target,
            stimulus_onset_ms,
            response_ms: None,
            classification: Classification::Miss,
            corrected_reaction_time_ms: None,
            has_visual_distractor: condition.visual_distractor,
            has_auditory_distractor: condition.auditory_distractor,
            distractor_shown,
        }
    }

    /// Latency from stimulus onset to the press, uncorrected.
    pub fn raw_reaction_time_ms(&self) -> Option<f64> {
        self.response_ms.map(|r| r - self.stimulus_onset_ms)
    }

    pub fn condition(&self) -> BlockCondition {
        BlockCondition::new(self.has_visual_distractor, self.has_auditory_distractor)
    }

    pub fn is(&self, classification: Classification) -> bool {
        self.classification == classification
    }
}

use cpt_core::{BlockCondition, DistractorKind, StimulusType, TrialState};

/// State of the trial in flight. Owned by the scheduler; the classifier
/// only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialContext {
    pub block_number: u32,
    pub trial_number: u32,
    pub is_target: bool,
    pub stimulus_onset_ms: f64,
    pub distractor: DistractorKind,
    pub condition: BlockCondition,
    pub state: TrialState,
    pub response_logged: bool,
}

impl TrialContext {
    pub fn new(
        block_number: u32,
        trial_number: u32,
        is_target: bool,
        stimulus_onset_ms: f64,
        distractor: DistractorKind,
        condition: BlockCondition,
    ) -> Self {
        Self {
            block_number,
            trial_number,
            is_target,
            stimulus_onset_ms,
            distractor,
            condition,
            state: TrialState::Stimulus,
            response_logged: false,
        }
    }

    pub fn stimulus_type(&self) -> StimulusType {
        StimulusType::from_target(self.is_target)
    }

    pub fn stimulus_visible(&self) -> bool {
        self.state == TrialState::Stimulus
    }

    /// The distractor shares the stimulus' lifetime on screen.
    pub fn visible_distractor(&self) -> DistractorKind {
        if self.stimulus_visible() {
            self.distractor
        } else {
            DistractorKind::None
        }
    }

    pub fn reaction_time_ms(&self, now_ms: f64) -> f64 {
        now_ms - self.stimulus_onset_ms
    }
}

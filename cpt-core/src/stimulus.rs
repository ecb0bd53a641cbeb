use serde::{Deserialize, Serialize};

/// Whether a trial's stimulus calls for a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StimulusType {
    Target,
    NonTarget,
}

impl StimulusType {
    pub fn from_target(is_target: bool) -> Self {
        if is_target {
            Self::Target
        } else {
            Self::NonTarget
        }
    }

    pub fn is_target(&self) -> bool {
        matches!(self, Self::Target)
    }
}

/// Distractor glyph shown next to the stimulus, if any
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistractorKind {
    #[default]
    None,
    VisualA,
    VisualB,
}

impl DistractorKind {
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Experimental condition of one block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockCondition {
    pub visual_distractor: bool,
    pub auditory_distractor: bool,
}

impl BlockCondition {
    pub const CLEAN: Self = Self::new(false, false);
    pub const VISUAL: Self = Self::new(true, false);
    pub const AUDITORY: Self = Self::new(false, true);
    pub const COMBO: Self = Self::new(true, true);

    pub const fn new(visual_distractor: bool, auditory_distractor: bool) -> Self {
        Self {
            visual_distractor,
            auditory_distractor,
        }
    }

    pub fn label(&self) -> &'static str {
        match (self.visual_distractor, self.auditory_distractor) {
            (false, false) => "clean",
            (true, false) => "visual",
            (false, true) => "auditory",
            (true, true) => "combo",
        }
    }
}

/// Block conditions by 1-based block number. The last clean block doubles
/// as a fatigue check against the first.
pub const BLOCK_SPECS: [BlockCondition; 8] = [
    BlockCondition::CLEAN,
    BlockCondition::VISUAL,
    BlockCondition::AUDITORY,
    BlockCondition::COMBO,
    BlockCondition::VISUAL,
    BlockCondition::AUDITORY,
    BlockCondition::COMBO,
    BlockCondition::CLEAN,
];

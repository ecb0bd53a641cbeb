use std::path::Path;

use cpt_core::{BlockCondition, BLOCK_SPECS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Timing and layout of one test administration. Defaults are the clinical
/// protocol; overrides exist for research variants and fast tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub stimulus_duration_ms: f64,
    pub response_window_ms: f64,
    pub inter_stimulus_interval_ms: f64,
    pub trials_per_block: u32,
    pub target_probability: f64,
    pub distractor_probability: f64,
    pub countdown_steps: u32,
    pub countdown_step_ms: f64,
    pub blocks: Vec<BlockCondition>,
    pub calibration: CalibrationConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            stimulus_duration_ms: 500.0,
            response_window_ms: 1_000.0,
            inter_stimulus_interval_ms: 1_500.0,
            trials_per_block: 10,
            target_probability: 0.7,
            distractor_probability: 0.3,
            countdown_steps: 3,
            countdown_step_ms: 1_000.0,
            blocks: BLOCK_SPECS.to_vec(),
            calibration: CalibrationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub required_samples: usize,
    pub cue_delay_min_ms: f64,
    pub cue_delay_max_ms: f64,
    /// Refuse to start the test before calibration is complete.
    pub required_for_test: bool,
    /// Also require the power and focus-mode confirmations.
    pub require_checklist: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            required_samples: 5,
            cue_delay_min_ms: 1_000.0,
            cue_delay_max_ms: 3_000.0,
            required_for_test: true,
            require_checklist: true,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("stimulus_duration_ms", self.stimulus_duration_ms),
            ("response_window_ms", self.response_window_ms),
            ("inter_stimulus_interval_ms", self.inter_stimulus_interval_ms),
            ("countdown_step_ms", self.countdown_step_ms),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{name} must be positive, got {value}")));
            }
        }
        for (name, p) in [
            ("target_probability", self.target_probability),
            ("distractor_probability", self.distractor_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(ConfigError::Invalid(format!("{name} must be within [0, 1], got {p}")));
            }
        }
        if self.trials_per_block == 0 {
            return Err(ConfigError::Invalid("trials_per_block must be at least 1".into()));
        }
        if self.blocks.is_empty() {
            return Err(ConfigError::Invalid("at least one block is required".into()));
        }
        let cal = &self.calibration;
        if cal.required_samples == 0 {
            return Err(ConfigError::Invalid("calibration needs at least one sample".into()));
        }
        if !(cal.cue_delay_min_ms >= 0.0 && cal.cue_delay_min_ms < cal.cue_delay_max_ms) {
            return Err(ConfigError::Invalid(format!(
                "cue delay range [{}, {}) is empty",
                cal.cue_delay_min_ms, cal.cue_delay_max_ms
            )));
        }
        Ok(())
    }

    pub fn total_blocks(&self) -> u32 {
        self.blocks.len() as u32
    }

    pub fn total_trials(&self) -> u32 {
        self.total_blocks() * self.trials_per_block
    }

    /// Latest reaction time, measured from stimulus onset, that still
    /// counts as a response to the stimulus.
    pub fn response_deadline_ms(&self) -> f64 {
        self.stimulus_duration_ms + self.response_window_ms
    }

    /// Condition of a 1-based block number.
    pub fn block(&self, block_number: u32) -> Option<BlockCondition> {
        let idx = block_number.checked_sub(1)? as usize;
        self.blocks.get(idx).copied()
    }
}

use cpt_core::SessionResult;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttentionLevel {
    NormalToHigh,
    Moderate,
    Impaired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpulsivityLevel {
    None,
    Mild,
    Significant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSpeed {
    Excellent,
    Normal,
    Slow,
}

/// Banded reading of a result plus 0–100 "higher is better" display
/// scores for charting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Interpretation {
    pub attention: AttentionLevel,
    pub impulsivity: ImpulsivityLevel,
    pub speed: ResponseSpeed,
    pub attention_score: f64,
    pub timeliness_score: f64,
    pub impulse_control_score: f64,
    pub activity_control_score: f64,
}

/// Reference latency that maps to a full timeliness score.
const TIMELINESS_REFERENCE_MS: f64 = 500.0;

impl Interpretation {
    pub fn from_result(result: &SessionResult) -> Self {
        let attention = if result.attentiveness >= 80.0 {
            AttentionLevel::NormalToHigh
        } else if result.attentiveness >= 60.0 {
            AttentionLevel::Moderate
        } else {
            AttentionLevel::Impaired
        };
        let impulsivity = if result.impulsivity <= 20.0 {
            ImpulsivityLevel::None
        } else if result.impulsivity <= 40.0 {
            ImpulsivityLevel::Mild
        } else {
            ImpulsivityLevel::Significant
        };
        let speed = if result.timeliness < 300.0 {
            ResponseSpeed::Excellent
        } else if result.timeliness < 500.0 {
            ResponseSpeed::Normal
        } else {
            ResponseSpeed::Slow
        };
        let timeliness_score = if result.timeliness > 0.0 {
            (TIMELINESS_REFERENCE_MS / result.timeliness * 100.0)
                .round()
                .min(100.0)
        } else {
            0.0
        };

        Self {
            attention,
            impulsivity,
            speed,
            attention_score: result.attentiveness.round(),
            timeliness_score,
            impulse_control_score: (100.0 - result.impulsivity).round(),
            activity_control_score: (100.0 - result.hyperactivity).round(),
        }
    }

    pub fn summary(&self) -> String {
        let attention = match self.attention {
            AttentionLevel::NormalToHigh => "Attention is within the normal to high range.",
            AttentionLevel::Moderate => "Attention is in the moderate range.",
            AttentionLevel::Impaired => "Significant attention difficulties were observed.",
        };
        let impulsivity = match self.impulsivity {
            ImpulsivityLevel::None => "No significant signs of impulsivity.",
            ImpulsivityLevel::Mild => "Mild signs of impulsivity.",
            ImpulsivityLevel::Significant => "Significant signs of impulsivity.",
        };
        let speed = match self.speed {
            ResponseSpeed::Excellent => "Response speed is excellent.",
            ResponseSpeed::Normal => "Response speed is normal.",
            ResponseSpeed::Slow => "Response speed is relatively slow.",
        };
        format!("{attention} {impulsivity} {speed}")
    }
}

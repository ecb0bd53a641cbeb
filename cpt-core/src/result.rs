use crate::trial::ResponseRecord;
use serde::{Deserialize, Serialize};

/// Final scores of a completed session together with its raw log.
///
/// `attentiveness`, `impulsivity` and `hyperactivity` are percentages in
/// `[0, 100]`. `timeliness` is a mean corrected reaction time in
/// milliseconds (lower is better) and can go negative when the subject
/// consistently anticipates the stimulus.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionResult {
    pub attentiveness: f64,
    pub timeliness: f64,
    pub impulsivity: f64,
    pub hyperactivity: f64,
    pub raw_log: Vec<ResponseRecord>,
}

impl SessionResult {
    pub fn is_empty(&self) -> bool {
        self.raw_log.is_empty()
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phases of the trial scheduler
#[derive(Copy, Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    #[default]
    Idle,
    Countdown,
    Running,
    Break,
    Complete,
    Exited,
}

impl SchedulerPhase {
    /// Only a running scheduler classifies subject input.
    pub fn allows_input(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// No further transitions happen out of these phases.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Exited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Countdown => "countdown",
            Self::Running => "running",
            Self::Break => "break",
            Self::Complete => "complete",
            Self::Exited => "exited",
        }
    }
}

impl fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_running_accepts_input() {
        use SchedulerPhase::*;
        for phase in [Idle, Countdown, Break, Complete, Exited] {
            assert!(!phase.allows_input(), "{phase} must reject input");
        }
        assert!(Running.allows_input());
    }

    #[test]
    fn terminal_phases() {
        assert!(SchedulerPhase::Complete.is_terminal());
        assert!(SchedulerPhase::Exited.is_terminal());
        assert!(!SchedulerPhase::Break.is_terminal());
        assert_eq!(SchedulerPhase::default(), SchedulerPhase::Idle);
    }
}

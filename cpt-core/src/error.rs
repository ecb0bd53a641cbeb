//! Contract violations raised by the test engine.
//!
//! Timing mistakes made by the subject are never errors; they are
//! classified and logged. These variants signal that the host drove the
//! engine out of order.

use thiserror::Error;

use crate::phase::SchedulerPhase;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("input received while scheduler is {phase}, expected running")]
    NotRunning { phase: SchedulerPhase },

    #[error("trial {trial} of block {block} already has a classified response")]
    AlreadyClassified { block: u32, trial: u32 },

    #[error("results requested while scheduler is {phase}, expected complete")]
    NotComplete { phase: SchedulerPhase },

    #[error("cannot {action} while scheduler is {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: SchedulerPhase,
    },

    #[error("calibration checklist incomplete: {missing}")]
    CalibrationIncomplete { missing: &'static str },

    #[error("no trial in flight")]
    NoActiveTrial,
}

pub type EngineResult<T> = Result<T, EngineError>;

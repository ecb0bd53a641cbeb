pub mod calibration;
pub mod classifier;
pub mod config;
pub mod log;
pub mod report;
pub mod runtime;
pub mod scheduler;
pub mod scoring;
pub mod session;
pub mod trial;

pub use calibration::{CalibrationEngine, CalibrationInput, CalibrationState, CatchTrialStart};
pub use classifier::ResponseClassifier;
pub use config::{CalibrationConfig, ConfigError, ExperimentConfig};
pub use log::{SessionLog, Tally};
pub use report::Interpretation;
pub use runtime::{Runner, SimulatedSubject, SubjectProfile};
pub use scheduler::{Progress, SchedulerEffect, TrialScheduler};
pub use scoring::{score, score_by_condition, ConditionScore};
pub use session::{Session, SessionEvent};
pub use trial::TrialContext;

pub mod error;
pub mod phase;
pub mod result;
pub mod stimulus;
pub mod trial;

pub use error::{EngineError, EngineResult};
pub use phase::SchedulerPhase;
pub use result::SessionResult;
pub use stimulus::{BlockCondition, DistractorKind, StimulusType, BLOCK_SPECS};
pub use trial::{Classification, ResponseRecord, TrialState};

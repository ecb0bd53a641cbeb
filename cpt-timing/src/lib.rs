pub mod clock;
pub mod timer;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use timer::{Boundary, Expired, TimerSlot, TimerToken};

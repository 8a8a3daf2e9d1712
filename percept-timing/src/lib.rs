pub mod slot;
pub mod timer;

pub use slot::{TimerFired, TimerSlot};
pub use timer::{HighPrecisionTimer, ManualTimer, Timer};

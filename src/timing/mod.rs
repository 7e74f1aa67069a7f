mod clock;
mod sequencer;
pub mod steps;

pub use clock::{Clock, ManualClock, SystemClock};
pub use sequencer::{CANCEL_THRESHOLD, Sequencer, is_sentinel};
pub use steps::{Script, StepCursor, StepError, StepSource};

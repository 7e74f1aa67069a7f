//! Cooperative, tick-driven step sequencer.
//!
//! A [`timing::StepSource`] describes "do A, wait T1, do B, wait T2, ..." as a
//! lazily produced series of waits. A [`timing::Sequencer`] pulls one step
//! each time the previous wait has elapsed, driven by a host loop that calls
//! [`timing::Sequencer::run`] with the time since its last call.
//!
//! ```
//! use cadence::events::Tick;
//! use cadence::timing::{Script, Sequencer};
//!
//! let mut seq = Sequencer::with_source(Script::new(vec![0.2, 0.2]), false);
//! seq.start();
//! assert_eq!(seq.run(0.05).unwrap(), Tick::Stepped { wait: 0.2 });
//! assert_eq!(seq.run(0.2).unwrap(), Tick::Stepped { wait: 0.2 });
//! assert_eq!(seq.run(0.2).unwrap(), Tick::Finished);
//! assert!(!seq.is_running());
//! ```

pub mod config;
pub mod engine;
pub mod events;
#[cfg(feature = "lua")]
pub mod scripting;
pub mod timing;

pub use config::{ConfigError, SequencerConfig, StepsConfig};
pub use engine::{DriverCommand, DriverHandle, DriverUpdate, spawn_driver};
pub use events::{SequencerStatus, Tick};
pub use timing::{Sequencer, StepError, StepSource};

/// What a single [`Sequencer::run`](crate::timing::Sequencer::run) call did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// No live cursor; nothing happened.
    Idle,
    /// The current wait has not elapsed yet.
    Waiting { remaining: f64 },
    /// A step ran and asked to wait this long before the next one.
    Stepped { wait: f64 },
    /// The sequence ended and a fresh cursor took its place.
    Restarted,
    /// The sequence ended; the sequencer is idle now.
    Finished,
}

impl Tick {
    /// True when the call pulled from the producer.
    pub fn pulled(&self) -> bool {
        !matches!(self, Tick::Idle | Tick::Waiting { .. })
    }
}

/// Point-in-time view of a sequencer, cheap to copy across threads.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct SequencerStatus {
    pub running: bool,
    pub remaining_wait: f64,
    pub auto_restart: bool,
    pub steps_taken: u64,
}

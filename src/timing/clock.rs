use std::time::Instant;

/// Source of elapsed time for [`Sequencer::tick`](super::Sequencer::tick).
pub trait Clock {
    /// Seconds since the previous call (or since creation, for the first).
    fn elapsed_seconds(&mut self) -> f64;
}

/// Wall clock backed by [`Instant`], for real host loops.
#[derive(Debug, Clone)]
pub struct SystemClock {
    last: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Forget time accumulated so far, e.g. when a sequence (re)starts.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed_seconds(&mut self) -> f64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        elapsed.as_secs_f64()
    }
}

/// Clock that only moves when told to. Used for offline stepping and tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualClock {
    pending: f64,
    total: f64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, seconds: f64) {
        self.pending += seconds;
        self.total += seconds;
    }

    /// Total time ever advanced, regardless of reads.
    pub fn now(&self) -> f64 {
        self.total
    }
}

impl Clock for ManualClock {
    fn elapsed_seconds(&mut self) -> f64 {
        std::mem::take(&mut self.pending)
    }
}

use std::sync::Arc;

use super::{Clock, StepCursor, StepError, StepSource};
use crate::events::{SequencerStatus, Tick};

/// Waits at or below this value end the sequence instead of delaying it.
pub const CANCEL_THRESHOLD: f64 = -0.5;

pub fn is_sentinel(wait: f64) -> bool {
    wait <= CANCEL_THRESHOLD
}

/// Drives a [`StepSource`] forward in lock-step with elapsed time.
///
/// The host calls [`start`](Self::start) once, then [`run`](Self::run) on
/// every pass with the time since the previous pass. When the current wait
/// has elapsed the next step is pulled from the source, which returns the
/// wait before the step after it. Nothing here blocks or sleeps.
pub struct Sequencer {
    source: Option<Arc<dyn StepSource>>,
    cursor: Option<StepCursor>,
    remaining: f64,
    auto_restart: bool,
    steps_taken: u64,
}

impl Sequencer {
    /// With `auto_restart` set the sequencer is running right away. Without
    /// a source that first cursor is empty, so the first `run` reports
    /// [`Tick::Finished`] and leaves it idle instead of restarting.
    pub fn new(source: Option<Arc<dyn StepSource>>, auto_restart: bool) -> Self {
        let mut sequencer = Self {
            source,
            cursor: None,
            remaining: 0.0,
            auto_restart,
            steps_taken: 0,
        };
        if auto_restart {
            sequencer.start();
        }
        sequencer
    }

    pub fn with_source(source: impl StepSource + 'static, auto_restart: bool) -> Self {
        Self::new(Some(Arc::new(source)), auto_restart)
    }

    /// (Re)starts the sequence from its first step, even if already running.
    ///
    /// The first step is pulled on the next [`run`](Self::run) call with no
    /// delay. Without a source the sequencer goes idle on that call.
    pub fn start(&mut self) {
        let cursor: StepCursor = match &self.source {
            Some(source) => source.steps(),
            None => Box::new(std::iter::empty()),
        };
        self.set_cursor(Some(cursor));
        tracing::debug!(has_source = self.source.is_some(), "sequence started");
    }

    /// Drops the live cursor without waiting for the sequence to end.
    pub fn stop(&mut self) {
        if self.cursor.is_some() {
            tracing::debug!(steps_taken = self.steps_taken, "sequence stopped");
        }
        self.set_cursor(None);
    }

    /// Advances the countdown by `elapsed` seconds and pulls the next step
    /// once it runs out. Safe to call in any state.
    ///
    /// Negative or non-finite elapsed times count as zero. A producer error
    /// is returned to the caller and leaves the sequencer idle; it is never
    /// restarted automatically.
    pub fn run(&mut self, elapsed: f64) -> Result<Tick, StepError> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(Tick::Idle);
        };

        if elapsed.is_finite() && elapsed > 0.0 {
            self.remaining -= elapsed;
        }
        if self.remaining > 0.0 {
            return Ok(Tick::Waiting {
                remaining: self.remaining,
            });
        }

        match cursor.next() {
            Some(Ok(wait)) if !is_sentinel(wait) => {
                let wait = if wait.is_nan() { 0.0 } else { wait };
                self.remaining = wait;
                self.steps_taken += 1;
                tracing::trace!(wait, steps_taken = self.steps_taken, "step pulled");
                Ok(Tick::Stepped { wait })
            }
            Some(Ok(wait)) => {
                tracing::debug!(wait, "sentinel wait, ending sequence");
                Ok(self.complete())
            }
            None => Ok(self.complete()),
            Some(Err(err)) => {
                tracing::warn!(error = %err, steps_taken = self.steps_taken, "step producer failed");
                self.set_cursor(None);
                Err(err)
            }
        }
    }

    /// [`run`](Self::run) with the elapsed time read from `clock`.
    pub fn tick(&mut self, clock: &mut impl Clock) -> Result<Tick, StepError> {
        let elapsed = clock.elapsed_seconds();
        self.run(elapsed)
    }

    pub fn is_running(&self) -> bool {
        self.cursor.is_some()
    }

    /// Seconds left until the next step is pulled.
    pub fn remaining_wait(&self) -> f64 {
        self.remaining
    }

    pub fn step_source(&self) -> Option<&Arc<dyn StepSource>> {
        self.source.as_ref()
    }

    /// Takes effect on the next start or restart; a live cursor keeps
    /// running the source it was created from.
    pub fn set_step_source(&mut self, source: Option<Arc<dyn StepSource>>) {
        self.source = source;
    }

    pub fn auto_restart(&self) -> bool {
        self.auto_restart
    }

    pub fn set_auto_restart(&mut self, auto_restart: bool) {
        self.auto_restart = auto_restart;
    }

    /// Steps pulled since the last (re)start.
    pub fn steps_taken(&self) -> u64 {
        self.steps_taken
    }

    pub fn status(&self) -> SequencerStatus {
        SequencerStatus {
            running: self.is_running(),
            remaining_wait: self.remaining,
            auto_restart: self.auto_restart,
            steps_taken: self.steps_taken,
        }
    }

    fn complete(&mut self) -> Tick {
        if self.auto_restart && self.source.is_some() {
            tracing::debug!(steps_taken = self.steps_taken, "sequence ended, restarting");
            self.start();
            Tick::Restarted
        } else {
            tracing::debug!(steps_taken = self.steps_taken, "sequence finished");
            self.set_cursor(None);
            Tick::Finished
        }
    }

    fn set_cursor(&mut self, cursor: Option<StepCursor>) {
        // Release the old cursor before the new one takes over.
        self.cursor = None;
        self.remaining = 0.0;
        self.steps_taken = 0;
        self.cursor = cursor;
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new(None, false)
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("has_source", &self.source.is_some())
            .field("running", &self.is_running())
            .field("remaining", &self.remaining)
            .field("auto_restart", &self.auto_restart)
            .field("steps_taken", &self.steps_taken)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::{ManualClock, Script, steps};
    use std::sync::Mutex;

    const EPS: f64 = 1e-9;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < EPS
    }

    fn script(waits: &[f64]) -> Sequencer {
        Sequencer::with_source(Script::new(waits.to_vec()), false)
    }

    /// Source whose steps record their index into a shared log when pulled.
    fn recording(waits: Vec<f64>) -> (Arc<Mutex<Vec<usize>>>, impl StepSource) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        let source = steps::from_fn(move || {
            let sink = Arc::clone(&sink);
            waits.clone().into_iter().enumerate().map(move |(i, w)| {
                sink.lock().unwrap().push(i);
                w
            })
        });
        (log, source)
    }

    #[test]
    fn idle_before_start() {
        let mut seq = script(&[0.1, 0.1]);
        for elapsed in [0.0, 0.5, 3.0, -1.0] {
            assert_eq!(seq.run(elapsed).unwrap(), Tick::Idle);
            assert!(!seq.is_running());
            assert_eq!(seq.remaining_wait(), 0.0);
        }
    }

    #[test]
    fn first_step_runs_without_delay() {
        let mut seq = script(&[1.0]);
        seq.start();
        assert!(seq.is_running());
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: 1.0 });
        assert!(approx(seq.remaining_wait(), 1.0));
    }

    #[test]
    fn start_while_running_resets_progress() {
        let (log, source) = recording(vec![5.0, 5.0, 5.0]);
        let mut seq = Sequencer::with_source(source, false);
        seq.start();
        seq.run(0.0).unwrap();
        seq.run(5.0).unwrap();
        seq.run(1.0).unwrap();
        assert!(approx(seq.remaining_wait(), 4.0));
        assert_eq!(seq.steps_taken(), 2);

        seq.start();
        assert_eq!(seq.remaining_wait(), 0.0);
        assert_eq!(seq.steps_taken(), 0);
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: 5.0 });
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 0]);
    }

    #[test]
    fn steps_begin_at_cumulative_waits() {
        let waits = [0.5, 1.0, 0.25, 2.0];
        let (log, source) = recording(waits.to_vec());
        let mut seq = Sequencer::with_source(source, false);
        let mut clock = ManualClock::new();
        let dt = 0.125;

        seq.start();
        let mut began_at = Vec::new();
        for _ in 0..100 {
            let before = log.lock().unwrap().len();
            seq.tick(&mut clock).unwrap();
            if log.lock().unwrap().len() > before {
                began_at.push(clock.now());
            }
            clock.advance(dt);
        }

        let expected = [0.0, 0.5, 1.5, 1.75];
        assert_eq!(began_at.len(), expected.len());
        for (actual, expected) in began_at.iter().zip(expected) {
            assert!(approx(*actual, expected), "{actual} vs {expected}");
        }
        assert!(!seq.is_running());
        assert_eq!(seq.run(10.0).unwrap(), Tick::Idle);
    }

    #[test]
    fn overshoot_is_not_carried_over() {
        let mut seq = script(&[1.0, 1.0, 1.0]);
        seq.start();
        seq.run(0.0).unwrap();
        assert_eq!(seq.run(1.75).unwrap(), Tick::Stepped { wait: 1.0 });
        assert!(approx(seq.remaining_wait(), 1.0));
    }

    #[test]
    fn finishes_and_stays_idle() {
        let mut seq = script(&[0.1]);
        seq.start();
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: 0.1 });
        assert_eq!(seq.run(0.1).unwrap(), Tick::Finished);
        assert!(!seq.is_running());
        assert_eq!(seq.remaining_wait(), 0.0);
        for _ in 0..5 {
            assert_eq!(seq.run(1.0).unwrap(), Tick::Idle);
        }
    }

    #[test]
    fn auto_restart_loops_from_first_step() {
        let (log, source) = recording(vec![0.2, 0.3]);
        let mut seq = Sequencer::with_source(source, true);
        assert!(seq.is_running());

        let mut ticks = Vec::new();
        for _ in 0..8 {
            ticks.push(seq.run(0.3).unwrap());
            assert!(seq.is_running());
        }

        assert_eq!(
            ticks,
            vec![
                Tick::Stepped { wait: 0.2 },
                Tick::Stepped { wait: 0.3 },
                Tick::Restarted,
                Tick::Stepped { wait: 0.2 },
                Tick::Stepped { wait: 0.3 },
                Tick::Restarted,
                Tick::Stepped { wait: 0.2 },
                Tick::Stepped { wait: 0.3 },
            ]
        );
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn auto_restart_toggle_applies_at_next_completion() {
        let mut seq = script(&[0.1]);
        seq.start();
        seq.set_auto_restart(true);
        seq.run(0.0).unwrap();
        assert_eq!(seq.run(0.1).unwrap(), Tick::Restarted);
        seq.set_auto_restart(false);
        seq.run(0.0).unwrap();
        assert_eq!(seq.run(0.1).unwrap(), Tick::Finished);
    }

    #[test]
    fn sentinel_ends_sequence() {
        for sentinel in [-0.5, -0.75, -1.0, f64::NEG_INFINITY] {
            let mut seq = script(&[0.1, sentinel, 0.1]);
            seq.start();
            seq.run(0.0).unwrap();
            assert_eq!(seq.run(0.1).unwrap(), Tick::Finished, "sentinel {sentinel}");
            assert!(!seq.is_running());
            assert_eq!(seq.remaining_wait(), 0.0);
        }
    }

    #[test]
    fn sentinel_restarts_when_auto_restart() {
        let mut seq = Sequencer::with_source(Script::new(vec![0.1, -0.5, 9.0]), true);
        seq.run(0.0).unwrap();
        assert_eq!(seq.run(0.1).unwrap(), Tick::Restarted);
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: 0.1 });
    }

    #[test]
    fn near_zero_negative_waits_proceed_immediately() {
        let mut seq = script(&[-0.4999, 0.0, 0.3]);
        seq.start();
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: -0.4999 });
        assert!(seq.is_running());
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: 0.0 });
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: 0.3 });
        assert!(approx(seq.remaining_wait(), 0.3));
    }

    #[test]
    fn no_source_goes_idle_safely() {
        let mut seq = Sequencer::default();
        seq.start();
        assert!(seq.is_running());
        assert_eq!(seq.run(0.1).unwrap(), Tick::Finished);
        assert!(!seq.is_running());
    }

    #[test]
    fn no_source_with_auto_restart_does_not_spin() {
        let mut seq = Sequencer::new(None, true);
        assert!(seq.is_running());
        assert_eq!(seq.run(0.0).unwrap(), Tick::Finished);
        assert!(!seq.is_running());
    }

    #[test]
    fn two_step_trace() {
        let mut seq = script(&[0.2, 0.2]);
        seq.start();
        assert_eq!(seq.remaining_wait(), 0.0);

        assert_eq!(seq.run(0.05).unwrap(), Tick::Stepped { wait: 0.2 });
        assert!(approx(seq.remaining_wait(), 0.2));

        assert_eq!(seq.run(0.2).unwrap(), Tick::Stepped { wait: 0.2 });
        assert!(approx(seq.remaining_wait(), 0.2));

        assert_eq!(seq.run(0.2).unwrap(), Tick::Finished);
        assert!(!seq.is_running());
        assert_eq!(seq.remaining_wait(), 0.0);
    }

    #[test]
    fn waiting_reports_remaining_time() {
        let mut seq = script(&[1.0, 1.0]);
        seq.start();
        seq.run(0.0).unwrap();
        assert_eq!(seq.run(0.25).unwrap(), Tick::Waiting { remaining: 0.75 });
        assert_eq!(seq.run(f64::NAN).unwrap(), Tick::Waiting { remaining: 0.75 });
        assert_eq!(seq.run(-3.0).unwrap(), Tick::Waiting { remaining: 0.75 });
    }

    #[test]
    fn nan_wait_counts_as_zero() {
        let mut seq = script(&[f64::NAN, 0.4]);
        seq.start();
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: 0.0 });
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: 0.4 });
    }

    #[test]
    fn new_source_applies_on_next_start() {
        let mut seq = script(&[1.0, 1.0]);
        seq.start();
        seq.run(0.0).unwrap();

        seq.set_step_source(Some(Arc::new(Script::new(vec![7.0]))));
        assert_eq!(seq.run(1.0).unwrap(), Tick::Stepped { wait: 1.0 });

        seq.start();
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: 7.0 });
    }

    #[test]
    fn stop_releases_cursor() {
        let mut seq = Sequencer::with_source(Script::new(vec![1.0]), true);
        seq.run(0.0).unwrap();
        seq.stop();
        assert!(!seq.is_running());
        assert_eq!(seq.remaining_wait(), 0.0);
        assert_eq!(seq.run(5.0).unwrap(), Tick::Idle);
    }

    #[test]
    fn producer_error_propagates_and_terminates() {
        let source = steps::try_from_fn(|| {
            vec![Ok(0.1), Err(StepError::producer("block missing")), Ok(0.1)]
        });
        let mut seq = Sequencer::with_source(source, true);
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: 0.1 });

        let err = seq.run(0.1).unwrap_err();
        assert!(err.to_string().contains("block missing"));
        assert!(!seq.is_running());
        assert_eq!(seq.remaining_wait(), 0.0);
        assert_eq!(seq.run(1.0).unwrap(), Tick::Idle);

        seq.start();
        assert_eq!(seq.run(0.0).unwrap(), Tick::Stepped { wait: 0.1 });
    }

    #[test]
    fn status_snapshot_tracks_state() {
        let mut seq = script(&[0.5, 0.5]);
        assert_eq!(seq.status(), SequencerStatus::default());

        seq.start();
        seq.run(0.0).unwrap();
        seq.run(0.2).unwrap();
        let status = seq.status();
        assert!(status.running);
        assert!(!status.auto_restart);
        assert_eq!(status.steps_taken, 1);
        assert!(approx(status.remaining_wait, 0.3));
    }
}

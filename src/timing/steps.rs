use std::sync::Arc;

/// Live position inside one run of a [`StepSource`].
///
/// Each item is the time to wait (in seconds) before pulling the next one.
/// Whatever the producer does while computing an item is the step itself.
pub type StepCursor = Box<dyn Iterator<Item = Result<f64, StepError>> + Send>;

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("step producer failed: {message}")]
    Producer { message: String },

    #[cfg(feature = "lua")]
    #[error("lua step producer failed: {0}")]
    Lua(#[from] mlua::Error),
}

impl StepError {
    pub fn producer(message: impl Into<String>) -> Self {
        StepError::Producer {
            message: message.into(),
        }
    }
}

/// A restartable producer of wait durations.
///
/// Every call to [`StepSource::steps`] must begin the producer's logic from
/// scratch; the sequencer calls it once per (re)start.
pub trait StepSource: Send + Sync {
    fn steps(&self) -> StepCursor;
}

impl<S: StepSource + ?Sized> StepSource for Arc<S> {
    fn steps(&self) -> StepCursor {
        (**self).steps()
    }
}

pub struct FnSteps<F> {
    factory: F,
}

impl<F, I> StepSource for FnSteps<F>
where
    F: Fn() -> I + Send + Sync,
    I: IntoIterator<Item = f64>,
    I::IntoIter: Send + 'static,
{
    fn steps(&self) -> StepCursor {
        Box::new((self.factory)().into_iter().map(Ok))
    }
}

pub struct TryFnSteps<F> {
    factory: F,
}

impl<F, I> StepSource for TryFnSteps<F>
where
    F: Fn() -> I + Send + Sync,
    I: IntoIterator<Item = Result<f64, StepError>>,
    I::IntoIter: Send + 'static,
{
    fn steps(&self) -> StepCursor {
        Box::new((self.factory)().into_iter())
    }
}

/// Builds a step source from a closure returning a fresh iterator of waits.
///
/// Domain work belongs inside the iterator (a `map`, a custom `Iterator`)
/// so it runs lazily, one step per pull:
///
/// ```
/// use cadence::timing::steps;
///
/// let blink = steps::from_fn(|| {
///     (0..3).map(|i| {
///         println!("blink {i}");
///         0.2
///     })
/// });
/// # let _ = blink;
/// ```
pub fn from_fn<F, I>(factory: F) -> FnSteps<F>
where
    F: Fn() -> I + Send + Sync,
    I: IntoIterator<Item = f64>,
    I::IntoIter: Send + 'static,
{
    FnSteps { factory }
}

pub fn try_from_fn<F, I>(factory: F) -> TryFnSteps<F>
where
    F: Fn() -> I + Send + Sync,
    I: IntoIterator<Item = Result<f64, StepError>>,
    I::IntoIter: Send + 'static,
{
    TryFnSteps { factory }
}

/// A fixed list of waits, replayed from the top on every restart.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    waits: Arc<[f64]>,
}

impl Script {
    pub fn new(waits: impl Into<Arc<[f64]>>) -> Self {
        Self {
            waits: waits.into(),
        }
    }

}

impl StepSource for Script {
    fn steps(&self) -> StepCursor {
        Box::new(ScriptCursor {
            waits: Arc::clone(&self.waits),
            position: 0,
        })
    }
}

struct ScriptCursor {
    waits: Arc<[f64]>,
    position: usize,
}

impl Iterator for ScriptCursor {
    type Item = Result<f64, StepError>;

    fn next(&mut self) -> Option<Self::Item> {
        let wait = *self.waits.get(self.position)?;
        self.position += 1;
        Some(Ok(wait))
    }
}

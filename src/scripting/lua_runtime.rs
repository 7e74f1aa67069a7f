use mlua::{Function, Lua, Thread, ThreadStatus};

use crate::timing::{StepCursor, StepError, StepSource};

/// Step source written in Lua.
///
/// The chunk must evaluate to a function. Each run of the sequence resumes
/// that function as a fresh coroutine; every `coroutine.yield(seconds)` is
/// one step, and returning ends the sequence. A bare `coroutine.yield()`
/// means "no delay".
pub struct LuaSteps {
    lua: Lua,
    function: Function,
}

impl LuaSteps {
    pub fn new(code: &str) -> Result<Self, StepError> {
        let lua = Lua::new();

        let log = lua.create_function(|_, message: String| {
            tracing::info!(target: "cadence::lua", "{message}");
            Ok(())
        })?;
        lua.globals().set("log", log)?;

        let function: Function = lua.load(code).set_name("steps").eval()?;
        Ok(Self { lua, function })
    }
}

impl StepSource for LuaSteps {
    fn steps(&self) -> StepCursor {
        match self.lua.create_thread(self.function.clone()) {
            Ok(thread) => Box::new(LuaCursor {
                thread: Some(thread),
            }),
            Err(err) => Box::new(std::iter::once(Err(StepError::from(err)))),
        }
    }
}

struct LuaCursor {
    thread: Option<Thread>,
}

impl Iterator for LuaCursor {
    type Item = Result<f64, StepError>;

    fn next(&mut self) -> Option<Self::Item> {
        let thread = self.thread.take()?;
        if !matches!(thread.status(), ThreadStatus::Resumable) {
            return None;
        }

        match thread.resume::<Option<f64>>(()) {
            Ok(wait) => {
                // A plain `return` finishes the coroutine; its value is not a step.
                if matches!(thread.status(), ThreadStatus::Resumable) {
                    self.thread = Some(thread);
                    Some(Ok(wait.unwrap_or(0.0)))
                } else {
                    None
                }
            }
            Err(err) => Some(Err(err.into())),
        }
    }
}

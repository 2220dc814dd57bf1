//! The coroutine side of a process.

use std::collections::VecDeque;

use thiserror::Error;

use crate::error::SimError;
use crate::event::{Awaitable, EventId};
use crate::value::Value;

use super::context::ProcessContext;

/// What a body hands back to the kernel after one advance.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Suspend until the occurrence fires.
    Wait(EventId),
    /// Terminate; the process succeeds with this value.
    Finish(Value),
}

impl Step {
    pub fn wait(on: impl Awaitable) -> Self {
        Step::Wait(on.event_id())
    }

    pub fn finish(value: impl Into<Value>) -> Self {
        Step::Finish(value.into())
    }
}

/// Failure raised while advancing a body.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Fault {
    /// A failure of the model itself. The process fails urgently with the
    /// payload and the run continues.
    #[error("model fault: {0}")]
    Model(Value),

    /// A kernel error propagated out of the body (usually with `?`). Aborts
    /// the enclosing run.
    #[error(transparent)]
    Kernel(#[from] SimError),
}

impl Fault {
    pub fn model(value: impl Into<Value>) -> Self {
        Fault::Model(value.into())
    }
}

pub type StepResult = Result<Step, Fault>;

// ── ProcessBody ───────────────────────────────────────────────────────

/// A lazily-advanced, non-restartable sequential body.
///
/// Each call to `resume` runs the body up to its next suspension point.
/// The context exposes the occurrence that woke it and, after a fault
/// delivery, the fault payload.
///
/// # Example
///
/// ```rust
/// use kairos::{ProcessContext, Simulation, Step, StepResult};
///
/// struct Ticker { left: u32 }
///
/// impl kairos::ProcessBody for Ticker {
///     fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> StepResult {
///         if self.left == 0 {
///             return Ok(Step::finish(ctx.now().ticks() as i64));
///         }
///         self.left -= 1;
///         Ok(Step::wait(ctx.timeout(2, ())?))
///     }
/// }
///
/// let mut sim = Simulation::new();
/// let p = sim.start("ticker", Ticker { left: 3 }).unwrap();
/// sim.run().unwrap();
/// assert_eq!(sim.value(p.event()).unwrap().and_then(|v| v.as_int()), Some(6));
/// ```
pub trait ProcessBody {
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> StepResult;
}

impl<F> ProcessBody for F
where
    F: FnMut(&mut ProcessContext<'_>) -> StepResult,
{
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> StepResult {
        (self)(ctx)
    }
}

// ── Script ────────────────────────────────────────────────────────────

type Stage = Box<dyn FnOnce(&mut ProcessContext<'_>) -> StepResult>;

/// A body made of stages run one per resume.
///
/// When every stage has run, the next resume finishes the process with the
/// value of the occurrence that woke it.
#[derive(Default)]
pub struct Script {
    stages: VecDeque<Stage>,
}

impl Script {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn then<F>(mut self, stage: F) -> Self
    where
        F: FnOnce(&mut ProcessContext<'_>) -> StepResult + 'static,
    {
        self.stages.push_back(Box::new(stage));
        self
    }
}

impl ProcessBody for Script {
    fn resume(&mut self, ctx: &mut ProcessContext<'_>) -> StepResult {
        match self.stages.pop_front() {
            Some(stage) => stage(ctx),
            None => Ok(Step::Finish(ctx.value().cloned().unwrap_or_default())),
        }
    }
}

impl std::fmt::Debug for Script {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Script")
            .field("remaining", &self.stages.len())
            .finish()
    }
}

//! Structured error types for the kernel.
//!
//! All fallible public APIs return `Result<T, SimError>`. Variants fall into
//! three groups (see [`ErrorKind`]):
//!
//! - *usage* errors are programming mistakes surfaced to the caller at once;
//! - *invariant* violations mean the fault-delivery protocol was not honored
//!   and the run cannot continue;
//! - *lookup* errors reference an id this simulation never allocated.
//!
//! Model faults are not errors: they travel through the `Fail` outcome of
//! the failing process (see [`crate::process::Fault`]).

use thiserror::Error;

use crate::event::EventId;
use crate::process::ProcessId;
use crate::time::VirtualTime;

/// Coarse classification of a [`SimError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    Invariant,
    Lookup,
}

/// The top-level error type for the simulation kernel.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    // ── Usage errors ──────────────────────────────────────

    /// The occurrence already left the pending state.
    #[error("occurrence {0} is already scheduled")]
    AlreadyScheduled(EventId),

    /// A callback was added after the subscriber list was consumed.
    #[error("occurrence {0} has already been processed")]
    AlreadyProcessed(EventId),

    /// A process yielded an occurrence that had already fired.
    #[error("process {process} yielded occurrence {event}, which has already fired")]
    AlreadyFired { process: ProcessId, event: EventId },

    /// The process has terminated and cannot be interrupted.
    #[error("process {0} has terminated and cannot be interrupted")]
    AlreadyFinished(ProcessId),

    /// A process attempted to interrupt itself.
    #[error("process {0} is not allowed to interrupt itself")]
    SelfInterrupt(ProcessId),

    /// The delay is negative (a target before `now`) or overflows the clock.
    #[error("invalid delay {delay} when current time is {now}")]
    InvalidDelay { now: VirtualTime, delay: i128 },

    /// `step` was called with nothing queued.
    #[error("simulation has no pending occurrences")]
    EmptyQueue,

    /// `step` or a `run*` method was called while an occurrence is firing.
    #[error("cannot step the simulation from inside a firing occurrence")]
    ReentrantStep,

    // ── Invariant violations ──────────────────────────────

    /// The body yielded again without acknowledging a delivered fault.
    #[error("process {0} continued without acknowledging its fault")]
    UnacknowledgedFault(ProcessId),

    /// The body terminated while a delivered fault was still outstanding.
    #[error("process {0} cannot finish while it is faulted")]
    FinishedWhileFaulted(ProcessId),

    // ── Lookup errors ─────────────────────────────────────

    #[error("occurrence {0} does not exist")]
    UnknownEvent(EventId),

    #[error("process {0} does not exist")]
    UnknownProcess(ProcessId),
}

impl SimError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SimError::UnacknowledgedFault(_) | SimError::FinishedWhileFaulted(_) => {
                ErrorKind::Invariant
            }
            SimError::UnknownEvent(_) | SimError::UnknownProcess(_) => ErrorKind::Lookup,
            _ => ErrorKind::Usage,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SimError::AlreadyScheduled(_) => "already_scheduled",
            SimError::AlreadyProcessed(_) => "already_processed",
            SimError::AlreadyFired { .. } => "already_fired",
            SimError::AlreadyFinished(_) => "already_finished",
            SimError::SelfInterrupt(_) => "self_interrupt",
            SimError::InvalidDelay { .. } => "invalid_delay",
            SimError::EmptyQueue => "empty_queue",
            SimError::ReentrantStep => "reentrant_step",
            SimError::UnacknowledgedFault(_) => "unacknowledged_fault",
            SimError::FinishedWhileFaulted(_) => "finished_while_faulted",
            SimError::UnknownEvent(_) => "unknown_event",
            SimError::UnknownProcess(_) => "unknown_process",
        }
    }

    pub fn is_invariant_violation(&self) -> bool {
        self.kind() == ErrorKind::Invariant
    }
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

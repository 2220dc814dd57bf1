//! Processes: sequential bodies driven by occurrence resumption.
//!
//! A process wraps a [`ProcessBody`] and is advanced one step each time the
//! occurrence it waits on fires. Its own completion is an occurrence too, so
//! other processes can wait on a [`ProcessHandle`] exactly as they wait on a
//! plain [`EventId`].
//!
//! # Fault delivery
//!
//! A failed occurrence cannot be thrown into a suspended body, so the kernel
//! marks the process *faulted*, stores the payload and advances the body.
//! The body must call [`ProcessContext::acknowledge_fault`] before it waits
//! again or finishes; otherwise the run aborts with
//! [`SimError::UnacknowledgedFault`](crate::SimError::UnacknowledgedFault) or
//! [`SimError::FinishedWhileFaulted`](crate::SimError::FinishedWhileFaulted).
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`body`] | [`ProcessBody`], [`Step`], [`Fault`], [`Script`] |
//! | [`context`] | [`ProcessContext`] |
//! | `resume` | `start`, the resume state machine, `interrupt` |

pub mod body;
pub mod context;
mod resume;

pub use body::{Fault, ProcessBody, Script, Step, StepResult};
pub use context::ProcessContext;

use crate::event::{Awaitable, EventId};
use crate::value::Value;

// ── ProcessId / ProcessHandle ─────────────────────────────────────────

/// Identifier of a process within one `Simulation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessId(u64);

impl ProcessId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        ProcessId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Handle returned by `Simulation::start`.
///
/// Awaitable (it resolves to the process's completion occurrence) and
/// interruptible through `Simulation::interrupt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ProcessHandle {
    id: ProcessId,
    event: EventId,
}

impl ProcessHandle {
    pub(crate) fn new(id: ProcessId, event: EventId) -> Self {
        ProcessHandle { id, event }
    }

    #[inline]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// The completion occurrence of this process.
    #[inline]
    pub fn event(&self) -> EventId {
        self.event
    }
}

impl Awaitable for ProcessHandle {
    fn event_id(&self) -> EventId {
        self.event
    }
}

impl std::fmt::Display for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.id, self.event)
    }
}

// ── ProcessRecord ─────────────────────────────────────────────────────

/// Arena entry for one process.
pub(crate) struct ProcessRecord {
    pub(crate) name: String,
    /// Completion occurrence.
    pub(crate) event: EventId,
    /// Taken out while advancing; dropped once the process terminates.
    pub(crate) body: Option<Box<dyn ProcessBody>>,
    /// Occurrence currently waited on.
    pub(crate) target: EventId,
    pub(crate) faulted: bool,
    /// Payload of the most recently delivered fault.
    pub(crate) fault: Option<Value>,
}

impl ProcessRecord {
    pub(crate) fn new(name: String, event: EventId, start: EventId, body: Box<dyn ProcessBody>) -> Self {
        ProcessRecord {
            name,
            event,
            body: Some(body),
            target: start,
            faulted: false,
            fault: None,
        }
    }
}

impl std::fmt::Debug for ProcessRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessRecord")
            .field("name", &self.name)
            .field("event", &self.event)
            .field("target", &self.target)
            .field("faulted", &self.faulted)
            .field("fault", &self.fault)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

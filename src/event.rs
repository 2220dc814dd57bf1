/// Occurrences: one-shot notifications with a write-once outcome.
///
/// An occurrence is created pending, scheduled exactly once (which fixes
/// its time, priority and sequence) and processed exactly once, at which
/// point its subscribers are consumed and invoked in registration order.
/// Records live in the `Simulation` arena and are addressed by `EventId`.

use crate::error::SimResult;
use crate::process::ProcessId;
use crate::simulation::Simulation;
use crate::time::VirtualTime;
use crate::value::Value;

// ── Event ID ──────────────────────────────────────────────────────────

/// Identifier of an occurrence within one `Simulation`.
///
/// Ids are handed out in allocation order and index the occurrence arena.
/// They say nothing about firing order; that is the job of the sequence
/// number assigned at schedule time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EventId(u64);

impl EventId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        EventId(raw)
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

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Awaitable ─────────────────────────────────────────────────────────

/// Anything a process can wait on.
///
/// Implemented by plain occurrences and by process handles, whose
/// completion is itself an occurrence.
pub trait Awaitable {
    fn event_id(&self) -> EventId;
}

impl Awaitable for EventId {
    fn event_id(&self) -> EventId {
        *self
    }
}

// ── Priority ──────────────────────────────────────────────────────────

/// Tie-break class among occurrences scheduled for the same instant.
///
/// `Urgent` sorts before `Normal`. Process starts and interrupts are urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Priority {
    Urgent,
    #[default]
    Normal,
}

impl Priority {
    #[inline]
    pub fn from_urgent(urgent: bool) -> Self {
        if urgent {
            Priority::Urgent
        } else {
            Priority::Normal
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Urgent => write!(f, "urgent"),
            Priority::Normal => write!(f, "normal"),
        }
    }
}

// ── Outcome / State ───────────────────────────────────────────────────

/// The result an occurrence carries once triggered.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Outcome {
    Ok(Value),
    Fail(Value),
}

impl Outcome {
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    #[inline]
    pub fn is_fail(&self) -> bool {
        matches!(self, Outcome::Fail(_))
    }

    #[inline]
    pub fn value(&self) -> &Value {
        match self {
            Outcome::Ok(v) | Outcome::Fail(v) => v,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            Outcome::Ok(v) | Outcome::Fail(v) => v,
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Ok(v) => write!(f, "ok({})", v),
            Outcome::Fail(v) => write!(f, "fail({})", v),
        }
    }
}

/// Lifecycle of an occurrence. Each transition happens exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum EventState {
    Pending,
    Scheduled,
    Processed,
}

// ── Subscribers ───────────────────────────────────────────────────────

/// Callback signature for collaborator hooks.
///
/// Hooks run synchronously inside `Simulation::step` and may schedule new
/// occurrences, but never pop the queue.
pub type Callback = Box<dyn FnOnce(&mut Simulation, EventId) -> SimResult<()>>;

/// An interested party in an occurrence.
pub(crate) enum Subscriber {
    /// Resume the given process with the fired occurrence.
    Resume(ProcessId),
    /// Arbitrary collaborator hook.
    Hook(Callback),
}

impl Subscriber {
    #[inline]
    pub(crate) fn resumes(&self, process: ProcessId) -> bool {
        matches!(self, Subscriber::Resume(p) if *p == process)
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Subscriber::Resume(p) => write!(f, "Resume({})", p),
            Subscriber::Hook(_) => write!(f, "Hook"),
        }
    }
}

// ── Event record ──────────────────────────────────────────────────────

/// Arena entry for one occurrence.
#[derive(Debug)]
pub(crate) struct EventRecord {
    pub(crate) state: EventState,
    pub(crate) time: Option<VirtualTime>,
    pub(crate) priority: Priority,
    pub(crate) sequence: Option<u64>,
    pub(crate) outcome: Option<Outcome>,
    /// `None` once consumed by firing.
    pub(crate) subscribers: Option<Vec<Subscriber>>,
}

impl EventRecord {
    pub(crate) fn new() -> Self {
        EventRecord {
            state: EventState::Pending,
            time: None,
            priority: Priority::Normal,
            sequence: None,
            outcome: None,
            subscribers: Some(Vec::new()),
        }
    }

    #[inline]
    pub(crate) fn is_pending(&self) -> bool {
        self.state == EventState::Pending
    }

    /// Remove the first registration of `process`, if the list is still live.
    pub(crate) fn unsubscribe(&mut self, process: ProcessId) -> bool {
        let Some(subs) = self.subscribers.as_mut() else {
            return false;
        };
        match subs.iter().position(|s| s.resumes(process)) {
            Some(pos) => {
                subs.remove(pos);
                true
            }
            None => false,
        }
    }
}

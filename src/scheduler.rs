/// Time-ordered occurrence queue.
///
/// A `BinaryHeap` with reversed `Ord` on `QueueEntry` acts as a min-heap
/// keyed by `(time, priority, sequence)`. Sequence numbers are strictly
/// increasing, so entries with equal time and priority pop in the order
/// they were pushed, which makes replay deterministic.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::event::{EventId, Priority};
use crate::time::VirtualTime;

// ── Queue entry ───────────────────────────────────────────────────────

/// One scheduled occurrence as seen by the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub time: VirtualTime,
    pub priority: Priority,
    pub sequence: u64,
    pub event: EventId,
}

impl QueueEntry {
    #[inline]
    pub fn key(&self) -> (VirtualTime, Priority, u64) {
        (self.time, self.priority, self.sequence)
    }
}

/// Ordering: smallest `(time, priority, sequence)` first.
///
/// `BinaryHeap` is a max-heap, so the natural ordering is reversed.
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.key().cmp(&self.key())
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────

/// Owns the heap and the sequence counter.
///
/// The heap is only pushed by `push` and only popped by `pop_next`; the
/// simulation never holds a borrow into it while firing, so pushes from
/// inside a callback are safe.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BinaryHeap<QueueEntry>,
    next_sequence: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Scheduler {
            queue: BinaryHeap::new(),
            next_sequence: 0,
        }
    }

    /// Queue `event` at `time` and return the entry, including its sequence.
    pub fn push(&mut self, event: EventId, time: VirtualTime, priority: Priority) -> QueueEntry {
        let entry = QueueEntry {
            time,
            priority,
            sequence: self.next_sequence,
            event,
        };
        self.next_sequence += 1;
        self.queue.push(entry);
        entry
    }

    /// Pop the globally minimal entry, or `None` when empty.
    pub fn pop_next(&mut self) -> Option<QueueEntry> {
        self.queue.pop()
    }

    pub fn peek_next(&self) -> Option<&QueueEntry> {
        self.queue.peek()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

}

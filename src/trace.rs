//! Firing trace and replay hash.
//!
//! When enabled through [`crate::SimConfig::record_trace`], the simulation
//! appends one entry per fired occurrence. Folding the trace with
//! [`trace_hash`] gives a fingerprint that two runs of the same model must
//! share.

use crate::event::{EventId, Priority};
use crate::time::VirtualTime;

/// A record of one fired occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry {
    pub time: VirtualTime,
    pub event: EventId,
    pub priority: Priority,
    pub sequence: u64,
    /// `true` for an `Ok` outcome.
    pub ok: bool,
}

impl TraceEntry {
    fn hash(&self) -> u64 {
        let mut h = hash_combine(self.time.ticks(), self.event.raw());
        h = hash_combine(h, self.sequence);
        h = hash_combine(h, self.priority as u64);
        hash_combine(h, self.ok as u64)
    }
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} #{} {} {}",
            self.time,
            self.event,
            self.sequence,
            self.priority,
            if self.ok { "ok" } else { "fail" }
        )
    }
}

/// Combine two u64 hashes deterministically.
pub fn hash_combine(a: u64, b: u64) -> u64 {
    let mut h = a;
    h = h.wrapping_mul(0x517cc1b727220a95);
    h = h.wrapping_add(b);
    h ^= h >> 32;
    h
}

/// Fold a trace into a single fingerprint.
pub fn trace_hash(entries: &[TraceEntry]) -> u64 {
    entries
        .iter()
        .fold(0xcbf29ce484222325, |acc, e| hash_combine(acc, e.hash()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(t: u64, e: u64, seq: u64) -> TraceEntry {
        TraceEntry {
            time: VirtualTime::new(t),
            event: EventId::new(e),
            priority: Priority::Normal,
            sequence: seq,
            ok: true,
        }
    }

    #[test]
    fn test_hash_is_order_sensitive() {
        let a = vec![entry(0, 0, 0), entry(1, 1, 1)];
        let b = vec![entry(1, 1, 1), entry(0, 0, 0)];
        assert_eq!(trace_hash(&a), trace_hash(&a.clone()));
        assert_ne!(trace_hash(&a), trace_hash(&b));
    }

    #[test]
    fn test_display() {
        assert_eq!(entry(5, 2, 3).to_string(), "[T=5] E#2 #3 normal ok");
    }
}

//! Simulation configuration.

use crate::time::VirtualTime;

/// Settings fixed when a `Simulation` is created.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serialize", serde(default))]
pub struct SimConfig {
    /// Initial value of `now`.
    pub start_time: VirtualTime,
    /// Record a [`crate::trace::TraceEntry`] for every fired occurrence.
    pub record_trace: bool,
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_start_time(mut self, start: impl Into<VirtualTime>) -> Self {
        self.start_time = start.into();
        self
    }

    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.record_trace = enabled;
        self
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            start_time: VirtualTime::ZERO,
            record_trace: false,
        }
    }
}

//! # Kairos — discrete-event simulation kernel
//!
//! Advances a logical clock by repeatedly firing the earliest pending
//! occurrence and resuming whichever processes were waiting on it. No
//! threads, no wall-clock time: two runs of the same model fire the same
//! occurrences in the same order.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────┐
//! │        Simulation          │ ← owns now, arenas, active process
//! │  ┌──────────────────────┐  │
//! │  │      Scheduler       │  │ ← min-heap on (time, priority, sequence)
//! │  └──────────────────────┘  │
//! │  ┌──────────────────────┐  │
//! │  │     Occurrences      │  │ ← write-once outcome + subscribers
//! │  └──────────────────────┘  │
//! │  ┌──────────────────────┐  │
//! │  │      Processes       │  │ ← bodies resumed on firing
//! │  └──────────────────────┘  │
//! └────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use kairos::{Outcome, Script, Simulation, Step, Value};
//!
//! let mut sim = Simulation::new();
//! let p = sim
//!     .start(
//!         "worker",
//!         Script::new()
//!             .then(|ctx| Ok(Step::wait(ctx.timeout(5, ())?)))
//!             .then(|_| Ok(Step::finish(42))),
//!     )
//!     .unwrap();
//!
//! sim.run().unwrap();
//! assert_eq!(sim.now().ticks(), 5);
//! assert_eq!(sim.process_outcome(p).unwrap(), Some(&Outcome::Ok(Value::Int(42))));
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod process;
pub mod scheduler;
pub mod simulation;
pub mod time;
pub mod trace;
pub mod value;

// Re-exports for convenience.
pub use config::SimConfig;
pub use error::{ErrorKind, SimError, SimResult};
pub use event::{Awaitable, Callback, EventId, EventState, Outcome, Priority};
pub use process::{
    Fault, ProcessBody, ProcessContext, ProcessHandle, ProcessId, Script, Step, StepResult,
};
pub use simulation::Simulation;
pub use time::VirtualTime;
pub use trace::TraceEntry;
pub use value::Value;

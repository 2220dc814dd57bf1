//! `ProcessContext`: what a body sees while it is being advanced.

use crate::error::SimResult;
use crate::event::{EventId, Outcome};
use crate::simulation::Simulation;
use crate::time::VirtualTime;
use crate::value::Value;

use super::body::ProcessBody;
use super::ProcessHandle;

/// Mutable context passed to a body on every resume.
///
/// Borrows the simulation mutably for the duration of one advance, so the
/// body can create and trigger occurrences, start and interrupt other
/// processes, and acknowledge a delivered fault. The active process is
/// carried here explicitly rather than read from ambient state.
pub struct ProcessContext<'a> {
    sim: &'a mut Simulation,
    process: ProcessHandle,
    fired: EventId,
}

impl<'a> ProcessContext<'a> {
    pub(crate) fn new(sim: &'a mut Simulation, process: ProcessHandle, fired: EventId) -> Self {
        ProcessContext {
            sim,
            process,
            fired,
        }
    }

    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.sim.now()
    }

    /// Handle of the process being advanced.
    #[inline]
    pub fn process(&self) -> ProcessHandle {
        self.process
    }

    /// The occurrence whose firing caused this resume.
    #[inline]
    pub fn fired(&self) -> EventId {
        self.fired
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.sim.outcome(self.fired).ok().flatten()
    }

    /// Value of the fired occurrence, whether it succeeded or failed.
    pub fn value(&self) -> Option<&Value> {
        self.outcome().map(Outcome::value)
    }

    /// `true` while a delivered fault has not been acknowledged.
    pub fn is_faulted(&self) -> bool {
        self.sim
            .processes
            .get(self.process.id().index())
            .is_some_and(|p| p.faulted)
    }

    /// Payload of the most recently delivered fault.
    pub fn fault(&self) -> Option<&Value> {
        self.sim
            .processes
            .get(self.process.id().index())
            .and_then(|p| p.fault.as_ref())
    }

    /// Accept a delivered fault so the body may continue.
    ///
    /// Returns `false` if there was nothing to acknowledge.
    pub fn acknowledge_fault(&mut self) -> bool {
        self.sim.acknowledge_fault(self.process.id())
    }

    /// Interrupt another process. Interrupting `self.process()` fails with
    /// `SelfInterrupt`.
    pub fn interrupt(&mut self, target: ProcessHandle, cause: impl Into<Value>) -> SimResult<EventId> {
        self.sim.interrupt(target, cause)
    }

    pub fn event(&mut self) -> EventId {
        self.sim.event()
    }

    pub fn timeout(&mut self, delay: u64, value: impl Into<Value>) -> SimResult<EventId> {
        self.sim.timeout(delay, value)
    }

    pub fn succeed(&mut self, event: EventId, value: impl Into<Value>) -> SimResult<VirtualTime> {
        self.sim.succeed(event, value)
    }

    pub fn fail(&mut self, event: EventId, value: impl Into<Value>, urgent: bool) -> SimResult<VirtualTime> {
        self.sim.fail(event, value, urgent)
    }

    pub fn start(
        &mut self,
        name: impl Into<String>,
        body: impl ProcessBody + 'static,
    ) -> SimResult<ProcessHandle> {
        self.sim.start(name, body)
    }

    /// Full simulation surface, for collaborators building on the kernel.
    pub fn sim(&mut self) -> &mut Simulation {
        &mut *self.sim
    }
}

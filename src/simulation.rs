/// Simulation execution loop.
///
/// `Simulation` owns simulated time, the occurrence arena, the scheduler
/// and every process. Its loop pops the earliest queued occurrence,
/// advances `now` to its timestamp and fires its subscribers, which
/// usually resume exactly one process. Everything is synchronous and
/// single-threaded.

use tracing::{error, info, trace};

use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::event::{Callback, EventId, EventRecord, EventState, Outcome, Priority, Subscriber};
use crate::process::{ProcessId, ProcessRecord};
use crate::scheduler::Scheduler;
use crate::time::VirtualTime;
use crate::trace::{trace_hash, TraceEntry};
use crate::value::Value;

/// Top-level simulation driver.
///
/// Create occurrences with [`event`](Self::event), trigger them with
/// [`succeed`](Self::succeed), [`fail`](Self::fail) or
/// [`trigger`](Self::trigger), start processes with
/// [`start`](Self::start), then call one of the `run*` methods or
/// [`step`](Self::step).
pub struct Simulation {
    pub(crate) scheduler: Scheduler,
    pub(crate) now: VirtualTime,
    pub(crate) events: Vec<EventRecord>,
    pub(crate) processes: Vec<ProcessRecord>,
    /// Set only while a process body is being advanced.
    pub(crate) active: Option<ProcessId>,
    /// Set for the whole of `step`.
    firing: bool,
    events_processed: u64,
    trace: Option<Vec<TraceEntry>>,
}

impl Simulation {
    /// Create a new simulation starting at time zero.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    pub fn with_config(config: SimConfig) -> Self {
        Simulation {
            scheduler: Scheduler::new(),
            now: config.start_time,
            events: Vec::new(),
            processes: Vec::new(),
            active: None,
            firing: false,
            events_processed: 0,
            trace: config.record_trace.then(Vec::new),
        }
    }

    // ── Clock and queue inspection ────────────────────────────────────

    /// Current virtual time.
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Total occurrences fired so far.
    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Number of scheduled, not yet fired occurrences.
    pub fn pending_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Returns `true` if nothing is left to fire.
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_empty()
    }

    /// Time of the next queued occurrence.
    pub fn peek(&self) -> Option<VirtualTime> {
        self.scheduler.peek_next().map(|e| e.time)
    }

    /// The process whose body is currently being advanced, if any.
    pub fn active_process(&self) -> Option<ProcessId> {
        self.active
    }

    /// Fired-occurrence trace, when enabled in the config.
    pub fn trace(&self) -> Option<&[TraceEntry]> {
        self.trace.as_deref()
    }

    pub fn trace_hash(&self) -> Option<u64> {
        self.trace.as_deref().map(trace_hash)
    }

    // ── Occurrences ───────────────────────────────────────────────────

    /// Allocate a new pending occurrence.
    pub fn event(&mut self) -> EventId {
        let id = EventId::new(self.events.len() as u64);
        self.events.push(EventRecord::new());
        id
    }

    pub(crate) fn record(&self, id: EventId) -> SimResult<&EventRecord> {
        self.events.get(id.index()).ok_or(SimError::UnknownEvent(id))
    }

    pub(crate) fn record_mut(&mut self, id: EventId) -> SimResult<&mut EventRecord> {
        self.events
            .get_mut(id.index())
            .ok_or(SimError::UnknownEvent(id))
    }

    pub fn event_state(&self, id: EventId) -> SimResult<EventState> {
        Ok(self.record(id)?.state)
    }

    /// The outcome, once the occurrence has been triggered.
    pub fn outcome(&self, id: EventId) -> SimResult<Option<&Outcome>> {
        Ok(self.record(id)?.outcome.as_ref())
    }

    pub fn value(&self, id: EventId) -> SimResult<Option<&Value>> {
        Ok(self.outcome(id)?.map(Outcome::value))
    }

    /// The `(time, priority, sequence)` key assigned when `id` was scheduled.
    pub fn schedule_key(&self, id: EventId) -> SimResult<Option<(VirtualTime, Priority, u64)>> {
        let record = self.record(id)?;
        Ok(record
            .time
            .zip(record.sequence)
            .map(|(time, seq)| (time, record.priority, seq)))
    }

    pub fn is_processed(&self, id: EventId) -> SimResult<bool> {
        Ok(self.record(id)?.state == EventState::Processed)
    }

    /// Place a pending occurrence into the queue `delay` ticks from now.
    ///
    /// An occurrence scheduled without an outcome succeeds with `Unit`.
    /// Returns the absolute time it will fire at.
    pub fn schedule(&mut self, id: EventId, delay: u64, priority: Priority) -> SimResult<VirtualTime> {
        self.ensure_pending(id)?;
        let at = self.now.plus(delay).ok_or(SimError::InvalidDelay {
            now: self.now,
            delay: i128::from(delay),
        })?;
        self.enqueue(id, at, priority, None)
    }

    /// Like [`schedule`](Self::schedule) with an absolute timestamp.
    pub fn schedule_at(&mut self, id: EventId, at: VirtualTime, priority: Priority) -> SimResult<VirtualTime> {
        self.ensure_pending(id)?;
        if at < self.now {
            return Err(SimError::InvalidDelay {
                now: self.now,
                delay: i128::from(at.ticks()) - i128::from(self.now.ticks()),
            });
        }
        self.enqueue(id, at, priority, None)
    }

    /// Set the outcome of a pending occurrence and schedule it.
    pub fn trigger(
        &mut self,
        id: EventId,
        outcome: Outcome,
        delay: u64,
        priority: Priority,
    ) -> SimResult<VirtualTime> {
        self.ensure_pending(id)?;
        let at = self.now.plus(delay).ok_or(SimError::InvalidDelay {
            now: self.now,
            delay: i128::from(delay),
        })?;
        self.enqueue(id, at, priority, Some(outcome))
    }

    /// Succeed a pending occurrence now, at normal priority.
    pub fn succeed(&mut self, id: EventId, value: impl Into<Value>) -> SimResult<VirtualTime> {
        self.trigger(id, Outcome::Ok(value.into()), 0, Priority::Normal)
    }

    /// Fail a pending occurrence now; `urgent` selects the priority class.
    pub fn fail(&mut self, id: EventId, value: impl Into<Value>, urgent: bool) -> SimResult<VirtualTime> {
        self.trigger(
            id,
            Outcome::Fail(value.into()),
            0,
            Priority::from_urgent(urgent),
        )
    }

    /// An occurrence that succeeds with `value` after `delay` ticks.
    pub fn timeout(&mut self, delay: u64, value: impl Into<Value>) -> SimResult<EventId> {
        let id = self.event();
        self.trigger(id, Outcome::Ok(value.into()), delay, Priority::Normal)?;
        Ok(id)
    }

    /// Register a hook to run when `id` fires.
    ///
    /// Fails with `AlreadyProcessed` once the occurrence has fired; the
    /// caller should read its outcome directly instead.
    pub fn add_callback<F>(&mut self, id: EventId, callback: F) -> SimResult<()>
    where
        F: FnOnce(&mut Simulation, EventId) -> SimResult<()> + 'static,
    {
        let hook: Callback = Box::new(callback);
        self.subscribe(id, Subscriber::Hook(hook))
    }

    pub(crate) fn subscribe(&mut self, id: EventId, subscriber: Subscriber) -> SimResult<()> {
        match self.record_mut(id)?.subscribers.as_mut() {
            Some(subs) => {
                subs.push(subscriber);
                Ok(())
            }
            None => Err(SimError::AlreadyProcessed(id)),
        }
    }

    fn ensure_pending(&self, id: EventId) -> SimResult<()> {
        if self.record(id)?.is_pending() {
            Ok(())
        } else {
            Err(SimError::AlreadyScheduled(id))
        }
    }

    fn enqueue(
        &mut self,
        id: EventId,
        at: VirtualTime,
        priority: Priority,
        outcome: Option<Outcome>,
    ) -> SimResult<VirtualTime> {
        let entry = self.scheduler.push(id, at, priority);
        let record = self.record_mut(id)?;
        record.state = EventState::Scheduled;
        record.time = Some(at);
        record.priority = priority;
        record.sequence = Some(entry.sequence);
        if let Some(outcome) = outcome {
            record.outcome = Some(outcome);
        } else if record.outcome.is_none() {
            record.outcome = Some(Outcome::Ok(Value::Unit));
        }
        Ok(at)
    }

    // ── Execution ─────────────────────────────────────────────────────

    /// Pop the earliest occurrence, advance time to it and fire it.
    ///
    /// Returns the id of the fired occurrence. Calling it from a body or a
    /// hook fails with `ReentrantStep`.
    ///
    /// If a subscriber returns an error, the subscribers after it are not
    /// invoked: the occurrence stays processed and the error is meant to
    /// end the run.
    pub fn step(&mut self) -> SimResult<EventId> {
        if self.firing {
            return Err(SimError::ReentrantStep);
        }
        self.firing = true;
        let fired = self.fire_next();
        self.firing = false;
        fired
    }

    fn fire_next(&mut self) -> SimResult<EventId> {
        let entry = self.scheduler.pop_next().ok_or(SimError::EmptyQueue)?;
        debug_assert!(
            entry.time >= self.now,
            "time went backward: now={}, entry={}",
            self.now,
            entry.time
        );
        self.now = entry.time;
        self.events_processed += 1;

        let record = self.record_mut(entry.event)?;
        record.state = EventState::Processed;
        let ok = record.outcome.as_ref().map_or(true, Outcome::is_ok);
        let subscribers = record.subscribers.take().unwrap_or_default();

        trace!(
            event = %entry.event,
            at = %entry.time,
            priority = %entry.priority,
            ok,
            subscribers = subscribers.len(),
            "firing"
        );
        if let Some(log) = self.trace.as_mut() {
            log.push(TraceEntry {
                time: entry.time,
                event: entry.event,
                priority: entry.priority,
                sequence: entry.sequence,
                ok,
            });
        }

        for subscriber in subscribers {
            match subscriber {
                Subscriber::Resume(process) => self.resume(process, entry.event)?,
                Subscriber::Hook(hook) => hook(self, entry.event)?,
            }
        }
        Ok(entry.event)
    }

    /// Run until nothing is left to fire.
    ///
    /// Returns the number of occurrences fired during this call.
    pub fn run(&mut self) -> SimResult<u64> {
        self.drive(|_| false)
    }

    /// Fire every occurrence scheduled at or before `until`.
    ///
    /// `now` stays at the time of the last fired occurrence.
    pub fn run_until(&mut self, until: VirtualTime) -> SimResult<u64> {
        self.drive(|sim| sim.peek().map_or(true, |next| next > until))
    }

    /// Run until `event` has been processed or the queue drains.
    pub fn run_until_event(&mut self, event: EventId) -> SimResult<u64> {
        self.record(event)?;
        self.drive(|sim| sim.events[event.index()].state == EventState::Processed)
    }

    /// Run until the queue drains or `max_steps` occurrences have fired.
    pub fn run_for(&mut self, max_steps: u64) -> SimResult<u64> {
        let start = self.events_processed;
        self.drive(|sim| sim.events_processed - start >= max_steps)
    }

    fn drive(&mut self, mut stop: impl FnMut(&Simulation) -> bool) -> SimResult<u64> {
        if self.firing {
            return Err(SimError::ReentrantStep);
        }
        let start = self.events_processed;
        while !self.scheduler.is_empty() && !stop(&*self) {
            if let Err(e) = self.step() {
                error!(label = e.as_label(), error = %e, at = %self.now, "run aborted");
                return Err(e);
            }
        }
        let fired = self.events_processed - start;
        info!(fired, now = %self.now, pending = self.scheduler.len(), "run finished");
        Ok(fired)
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("now", &self.now)
            .field("pending", &self.scheduler.len())
            .field("events", &self.events.len())
            .field("processes", &self.processes.len())
            .field("active", &self.active)
            .field("firing", &self.firing)
            .field("events_processed", &self.events_processed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(u64, String)>>>;

    fn log_on_fire(sim: &mut Simulation, id: EventId, label: &str, log: &Log) {
        let log = Rc::clone(log);
        let label = label.to_owned();
        sim.add_callback(id, move |sim, _| {
            log.borrow_mut().push((sim.now().ticks(), label));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_basic_execution_loop() {
        let mut sim = Simulation::new();
        let log: Log = Rc::default();

        for (delay, label) in [(10, "a"), (20, "b"), (30, "c")] {
            let ev = sim.timeout(delay, ()).unwrap();
            log_on_fire(&mut sim, ev, label, &log);
        }

        assert_eq!(sim.run().unwrap(), 3);
        let labels: Vec<String> = log.borrow().iter().map(|(_, l)| l.clone()).collect();
        assert_eq!(labels, vec!["a", "b", "c"]);
        assert_eq!(sim.now(), VirtualTime::new(30));
    }

    #[test]
    fn test_callback_schedules_followup() {
        fn ping(sim: &mut Simulation, log: Log) -> SimResult<()> {
            let ev = sim.timeout(10, ())?;
            sim.add_callback(ev, move |sim, _| {
                log.borrow_mut().push((sim.now().ticks(), "ping".into()));
                if sim.now().ticks() < 30 {
                    ping(sim, log)?;
                }
                Ok(())
            })
        }

        let mut sim = Simulation::new();
        let log: Log = Rc::default();
        ping(&mut sim, Rc::clone(&log)).unwrap();
        sim.run().unwrap();

        let times: Vec<u64> = log.borrow().iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![10, 20, 30]);
        assert_eq!(sim.now(), VirtualTime::new(30));
    }

    #[test]
    fn test_step_by_step() {
        let mut sim = Simulation::new();
        let first = sim.timeout(5, ()).unwrap();
        let second = sim.timeout(15, ()).unwrap();

        assert_eq!(sim.step().unwrap(), first);
        assert_eq!(sim.now(), VirtualTime::new(5));
        assert_eq!(sim.step().unwrap(), second);
        assert_eq!(sim.now(), VirtualTime::new(15));
        assert_eq!(sim.step(), Err(SimError::EmptyQueue));
    }

    #[test]
    fn test_urgent_fires_before_normal_regardless_of_submission() {
        let mut sim = Simulation::new();
        let log: Log = Rc::default();

        let normal = sim.event();
        let urgent = sim.event();
        sim.schedule(normal, 0, Priority::Normal).unwrap();
        sim.schedule(urgent, 0, Priority::Urgent).unwrap();
        log_on_fire(&mut sim, normal, "normal", &log);
        log_on_fire(&mut sim, urgent, "urgent", &log);

        sim.run().unwrap();
        let labels: Vec<String> = log.borrow().iter().map(|(_, l)| l.clone()).collect();
        assert_eq!(labels, vec!["urgent", "normal"]);
    }

    #[test]
    fn test_double_trigger_rejected_and_callbacks_fire_once() {
        let mut sim = Simulation::new();
        let count = Rc::new(RefCell::new(0));
        let ev = sim.event();
        let c = Rc::clone(&count);
        sim.add_callback(ev, move |_, _| {
            *c.borrow_mut() += 1;
            Ok(())
        })
        .unwrap();

        sim.succeed(ev, 1).unwrap();
        assert_eq!(sim.succeed(ev, 2), Err(SimError::AlreadyScheduled(ev)));
        assert_eq!(sim.fail(ev, "x", false), Err(SimError::AlreadyScheduled(ev)));
        sim.run().unwrap();
        assert_eq!(sim.fail(ev, "x", true), Err(SimError::AlreadyScheduled(ev)));

        assert_eq!(*count.borrow(), 1);
        assert_eq!(sim.outcome(ev).unwrap(), Some(&Outcome::Ok(Value::Int(1))));
    }

    #[test]
    fn test_add_callback_after_processed() {
        let mut sim = Simulation::new();
        let ev = sim.timeout(0, ()).unwrap();
        sim.run().unwrap();
        assert_eq!(
            sim.add_callback(ev, |_, _| Ok(())),
            Err(SimError::AlreadyProcessed(ev))
        );
        assert_eq!(sim.event_state(ev).unwrap(), EventState::Processed);
    }

    #[test]
    fn test_schedule_state_transitions() {
        let mut sim = Simulation::new();
        let ev = sim.event();
        assert_eq!(sim.event_state(ev).unwrap(), EventState::Pending);
        assert_eq!(sim.outcome(ev).unwrap(), None);

        assert_eq!(sim.schedule_key(ev).unwrap(), None);
        sim.schedule(ev, 3, Priority::Normal).unwrap();
        assert_eq!(sim.event_state(ev).unwrap(), EventState::Scheduled);
        assert_eq!(
            sim.schedule_key(ev).unwrap(),
            Some((VirtualTime::new(3), Priority::Normal, 0))
        );
        assert_eq!(sim.value(ev).unwrap(), Some(&Value::Unit));
        assert_eq!(
            sim.schedule(ev, 1, Priority::Normal),
            Err(SimError::AlreadyScheduled(ev))
        );
    }

    #[test]
    fn test_invalid_delay() {
        let mut sim = Simulation::with_config(SimConfig::new().with_start_time(10));
        let ev = sim.event();
        assert_eq!(
            sim.schedule_at(ev, VirtualTime::new(4), Priority::Normal),
            Err(SimError::InvalidDelay {
                now: VirtualTime::new(10),
                delay: -6
            })
        );
        assert!(matches!(
            sim.schedule(ev, u64::MAX, Priority::Normal),
            Err(SimError::InvalidDelay { .. })
        ));
        // Failed attempts leave the occurrence pending.
        assert_eq!(sim.event_state(ev).unwrap(), EventState::Pending);
        assert_eq!(
            sim.schedule_at(ev, VirtualTime::new(12), Priority::Normal),
            Ok(VirtualTime::new(12))
        );
    }

    #[test]
    fn test_unknown_event() {
        let mut sim = Simulation::new();
        let bogus = EventId::new(99);
        assert_eq!(sim.succeed(bogus, ()), Err(SimError::UnknownEvent(bogus)));
        assert_eq!(sim.run_until_event(bogus), Err(SimError::UnknownEvent(bogus)));
    }

    #[test]
    fn test_run_until_time_is_inclusive() {
        let mut sim = Simulation::new();
        for delay in [5, 10, 10, 15] {
            sim.timeout(delay, ()).unwrap();
        }

        assert_eq!(sim.run_until(VirtualTime::new(10)).unwrap(), 3);
        assert_eq!(sim.now(), VirtualTime::new(10));
        assert_eq!(sim.peek(), Some(VirtualTime::new(15)));
        assert!(!sim.is_finished());
    }

    #[test]
    fn test_run_until_event() {
        let mut sim = Simulation::new();
        sim.timeout(1, ()).unwrap();
        let stop = sim.timeout(2, ()).unwrap();
        sim.timeout(3, ()).unwrap();

        assert_eq!(sim.run_until_event(stop).unwrap(), 2);
        assert!(sim.is_processed(stop).unwrap());
        assert_eq!(sim.pending_count(), 1);
    }

    #[test]
    fn test_run_for_limits_steps() {
        let mut sim = Simulation::new();
        for i in 0..100 {
            sim.timeout(i, ()).unwrap();
        }

        assert_eq!(sim.run_for(10).unwrap(), 10);
        assert_eq!(sim.events_processed(), 10);
        assert!(!sim.is_finished());
    }

    #[test]
    fn test_time_monotonicity() {
        let mut sim = Simulation::new();
        let times: Rc<RefCell<Vec<u64>>> = Rc::default();
        for delay in [100, 50, 75, 10] {
            let ev = sim.timeout(delay, ()).unwrap();
            let times = Rc::clone(&times);
            sim.add_callback(ev, move |sim, _| {
                times.borrow_mut().push(sim.now().ticks());
                Ok(())
            })
            .unwrap();
        }
        sim.run().unwrap();
        assert_eq!(*times.borrow(), vec![10, 50, 75, 100]);
    }

    #[test]
    fn test_deterministic_replay() {
        fn run_trace() -> (Vec<TraceEntry>, u64) {
            let mut sim = Simulation::with_config(SimConfig::new().with_trace(true));
            for delay in [5, 5, 3, 10] {
                sim.timeout(delay, ()).unwrap();
            }
            let urgent = sim.event();
            sim.fail(urgent, "x", true).unwrap();
            sim.run().unwrap();
            (sim.trace().unwrap().to_vec(), sim.trace_hash().unwrap())
        }

        let (trace1, hash1) = run_trace();
        let (trace2, hash2) = run_trace();
        assert_eq!(trace1, trace2, "simulation is not deterministic");
        assert_eq!(hash1, hash2);
        assert!(!trace1[0].ok);
        assert_eq!(trace1.len(), 5);
    }

    #[test]
    fn test_trace_disabled_by_default() {
        let sim = Simulation::new();
        assert!(sim.trace().is_none());
        assert!(sim.trace_hash().is_none());
    }

    #[test]
    fn test_empty_simulation() {
        let mut sim = Simulation::new();
        assert_eq!(sim.run().unwrap(), 0);
        assert!(sim.is_finished());
        assert_eq!(sim.now(), VirtualTime::ZERO);
    }

    #[test]
    fn test_nested_step_from_hook_is_rejected() {
        let mut sim = Simulation::new();
        let seen: Rc<RefCell<Vec<SimResult<u64>>>> = Rc::default();
        let ev = sim.timeout(1, ()).unwrap();
        sim.timeout(2, ()).unwrap();
        let s = Rc::clone(&seen);
        sim.add_callback(ev, move |sim, _| {
            s.borrow_mut().push(sim.step().map(|e| e.raw()));
            s.borrow_mut().push(sim.run());
            Ok(())
        })
        .unwrap();

        assert_eq!(sim.run().unwrap(), 2);
        assert_eq!(
            *seen.borrow(),
            vec![Err(SimError::ReentrantStep), Err(SimError::ReentrantStep)]
        );
        // The guard is released after each step.
        assert_eq!(sim.now(), VirtualTime::new(2));
    }

    #[test]
    fn test_subscribers_after_failing_hook_are_skipped() {
        let mut sim = Simulation::new();
        let later = Rc::new(RefCell::new(false));
        let ev = sim.timeout(1, ()).unwrap();
        sim.add_callback(ev, |_, id| Err(SimError::AlreadyProcessed(id)))
            .unwrap();
        let l = Rc::clone(&later);
        sim.add_callback(ev, move |_, _| {
            *l.borrow_mut() = true;
            Ok(())
        })
        .unwrap();

        assert_eq!(sim.step(), Err(SimError::AlreadyProcessed(ev)));
        assert!(!*later.borrow());
        assert!(sim.is_processed(ev).unwrap());
        // The failed step does not leave the guard set.
        assert_eq!(sim.step(), Err(SimError::EmptyQueue));
    }

    #[test]
    fn test_hook_error_aborts_run() {
        let mut sim = Simulation::new();
        let ev = sim.timeout(1, ()).unwrap();
        sim.timeout(2, ()).unwrap();
        sim.add_callback(ev, |_, id| Err(SimError::AlreadyProcessed(id)))
            .unwrap();

        assert_eq!(sim.run(), Err(SimError::AlreadyProcessed(ev)));
        assert_eq!(sim.now(), VirtualTime::new(1));
        assert_eq!(sim.pending_count(), 1);
    }
}

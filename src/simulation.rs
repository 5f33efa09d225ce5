/// Simulation execution loop.
///
/// Drives the scheduler: pops events, advances virtual time, dispatches
/// to a handler. The loop is synchronous and single-threaded; every
/// state change happens inside one handler call at one instant.

use std::collections::BTreeSet;

use tracing::trace;

use crate::error::{SimError, SimResult};
use crate::event::{Event, EventId, EventType};
use crate::eventlog::EventLog;
use crate::scheduler::Scheduler;
use crate::time::VirtualTime;

// ── Handler trait ─────────────────────────────────────────────────────

/// Reacts to dispatched events.
///
/// The handler receives a `SimulationContext` so it can schedule or
/// cancel follow-up events.
pub trait EventHandler {
    /// Called for every dispatched event.
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event);

    /// Deterministic hash of the handler's state, recorded in
    /// checkpoints.
    fn compute_state_hash(&self) -> u64 {
        0
    }
}

/// A handler backed by a closure, for tests and one-off scripts.
impl<F> EventHandler for F
where
    F: FnMut(&mut SimulationContext, &Event),
{
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) {
        (self)(ctx, event);
    }
}

// ── Simulation Context ───────────────────────────────────────────────

/// Mutable context passed to the handler on every dispatch.
///
/// Borrows the scheduler mutably, so a handler cannot interfere with
/// dispatch ordering outside of the schedule API.
pub struct SimulationContext<'a> {
    pub(crate) scheduler: &'a mut Scheduler,
    pub(crate) now: VirtualTime,
}

impl<'a> SimulationContext<'a> {
    #[inline]
    pub fn now(&self) -> VirtualTime {
        self.now
    }

    /// Schedule an event at an absolute virtual time.
    pub fn schedule_at(&mut self, at: VirtualTime, payload: EventType) -> SimResult<EventId> {
        if at.is_before(self.now) {
            return Err(SimError::InvalidSchedule {
                requested: at.ticks(),
                current: self.now.ticks(),
            });
        }
        Ok(self.scheduler.schedule(at, payload))
    }

    /// Schedule an event `delay` ticks from now. Saturates at the end of
    /// time instead of overflowing.
    pub fn schedule_after(&mut self, delay: u64, payload: EventType) -> EventId {
        self.scheduler.schedule(self.now.saturating_add(delay), payload)
    }

    /// Cancel a pending event. Firing a cancelled event is a no-op.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.scheduler.cancel(id)
    }

    /// Number of live pending events.
    pub fn pending_count(&self) -> usize {
        self.scheduler.len()
    }
}

// ── Simulation ────────────────────────────────────────────────────────

/// Top-level simulation driver.
///
/// Owns the scheduler and the clock. Call `run` to drain the queue,
/// `run_until` to stop at a simulated time, or `step` to advance by
/// exactly one event.
#[derive(Debug, Clone, Default)]
pub struct Simulation {
    scheduler: Scheduler,
    current_time: VirtualTime,
    events_processed: u64,
    event_log: Option<EventLog>,
}

impl Simulation {
    /// Create a new simulation starting at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_time(&self) -> VirtualTime {
        self.current_time
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    pub fn pending_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Schedule an event. Fails if `at` is before the current time.
    pub fn schedule(&mut self, at: VirtualTime, payload: EventType) -> SimResult<EventId> {
        if at.is_before(self.current_time) {
            return Err(SimError::InvalidSchedule {
                requested: at.ticks(),
                current: self.current_time.ticks(),
            });
        }
        Ok(self.scheduler.schedule(at, payload))
    }

    /// Cancel a previously scheduled event before it fires.
    pub fn cancel(&mut self, id: EventId) -> bool {
        self.scheduler.cancel(id)
    }

    // ── Event logging ─────────────────────────────────────────────

    /// Record every dispatched event.
    pub fn enable_logging(&mut self) {
        self.event_log = Some(EventLog::new());
    }

    /// Record every dispatched event and checkpoint the handler's state
    /// hash every `interval` events.
    pub fn enable_logging_with_checkpoints(&mut self, interval: u64) {
        self.event_log = Some(EventLog::with_checkpoint_interval(interval));
    }

    pub fn event_log(&self) -> Option<&EventLog> {
        self.event_log.as_ref()
    }

    /// A fresh simulation seeded with every externally injected event of
    /// `log` under its original ID. Derived events are left out because
    /// the run regenerates them; every other ID the original run consumed
    /// stays reserved, so regenerated events get their original IDs and
    /// equal-time ties break as before. Logging is enabled on the copy.
    pub fn replay(log: &EventLog) -> Self {
        let mut sim = Simulation::new();
        let mut derived = BTreeSet::new();
        let mut last = None;
        for e in log.events() {
            last = last.max(Some(e.id));
            if e.payload.is_derived() {
                derived.insert(e.id);
            } else {
                sim.scheduler
                    .schedule_with_id(e.id, e.scheduled_at, e.payload.clone());
            }
        }

        // Gaps are events that never fired (cancelled or still queued).
        if let Some(last) = last {
            for id in (0..last.raw()).map(EventId::new) {
                if !derived.contains(&id) {
                    sim.scheduler.reserve_id(id);
                }
            }
        }
        sim.enable_logging();
        sim
    }

    // ── Execution ─────────────────────────────────────────────────

    /// Execute a single step: pop one event, advance time, dispatch.
    ///
    /// Returns the processed event, or `None` if the queue is empty.
    pub fn step(&mut self, handler: &mut dyn EventHandler) -> Option<Event> {
        let event = self.scheduler.pop_next()?;

        // Schedule entry points reject past times, so the heap head can
        // never be behind the clock.
        debug_assert!(
            !event.scheduled_at.is_before(self.current_time),
            "time went backward: current={}, event={}",
            self.current_time,
            event.scheduled_at
        );
        self.current_time = event.scheduled_at;
        self.events_processed += 1;
        trace!(id = %event.id, at = %event.scheduled_at, event = %event.payload, "dispatch");

        let mut ctx = SimulationContext {
            scheduler: &mut self.scheduler,
            now: self.current_time,
        };
        handler.handle(&mut ctx, &event);

        if let Some(log) = self.event_log.as_mut() {
            log.record(event.clone());
            if log.should_checkpoint(self.events_processed) {
                log.add_checkpoint(self.events_processed, self.current_time, handler.compute_state_hash());
            }
        }

        Some(event)
    }

    /// Run until the event queue is empty.
    ///
    /// Returns the number of events processed during this call.
    pub fn run(&mut self, handler: &mut dyn EventHandler) -> u64 {
        let start = self.events_processed;
        while self.step(handler).is_some() {}
        self.events_processed - start
    }

    /// Run every event scheduled at or before `stop`, then advance the
    /// clock to `stop`. Later events stay queued.
    pub fn run_until(&mut self, stop: VirtualTime, handler: &mut dyn EventHandler) -> u64 {
        let start = self.events_processed;
        while self
            .scheduler
            .peek_next()
            .is_some_and(|e| e.scheduled_at <= stop)
        {
            self.step(handler);
        }
        if self.current_time.is_before(stop) {
            self.current_time = stop;
        }
        self.events_processed - start
    }

    /// Run until the queue is empty or `max_steps` events have been
    /// dispatched, whichever comes first.
    pub fn run_for(&mut self, max_steps: u64, handler: &mut dyn EventHandler) -> u64 {
        let start = self.events_processed;
        let mut steps = 0u64;
        while steps < max_steps {
            if self.step(handler).is_none() {
                break;
            }
            steps += 1;
        }
        self.events_processed - start
    }

    /// Returns `true` if there are no more events to process.
    pub fn is_finished(&self) -> bool {
        self.scheduler.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventlog::logs_match;

    fn noop() -> impl FnMut(&mut SimulationContext, &Event) {
        |_ctx: &mut SimulationContext, _event: &Event| {}
    }

    #[test]
    fn test_basic_execution_loop() {
        let mut sim = Simulation::new();

        sim.schedule(VirtualTime::new(10), EventType::Log("a".into())).unwrap();
        sim.schedule(VirtualTime::new(20), EventType::Log("b".into())).unwrap();
        sim.schedule(VirtualTime::new(30), EventType::Log("c".into())).unwrap();

        let mut log: Vec<String> = Vec::new();
        let processed = sim.run(&mut |_ctx: &mut SimulationContext, event: &Event| {
            if let EventType::Log(msg) = &event.payload {
                log.push(msg.clone());
            }
        });

        assert_eq!(processed, 3);
        assert_eq!(log, vec!["a", "b", "c"]);
        assert_eq!(sim.current_time(), VirtualTime::new(30));
    }

    #[test]
    fn test_handler_schedules_followup() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::new(0), EventType::Log("start".into())).unwrap();

        let mut log: Vec<(u64, String)> = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext, event: &Event| {
            if let EventType::Log(msg) = &event.payload {
                log.push((ctx.now().ticks(), msg.clone()));
                if ctx.now().ticks() < 30 {
                    ctx.schedule_after(10, EventType::Log("ping".into()));
                }
            }
        });

        assert_eq!(
            log,
            vec![
                (0, "start".into()),
                (10, "ping".into()),
                (20, "ping".into()),
                (30, "ping".into()),
            ]
        );
    }

    #[test]
    fn test_schedule_in_past_fails() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::new(50), EventType::Noop).unwrap();
        sim.run(&mut noop());

        let err = sim.schedule(VirtualTime::new(10), EventType::Noop).unwrap_err();
        assert!(matches!(
            err,
            SimError::InvalidSchedule { requested: 10, current: 50 }
        ));
        // Not fatal: scheduling at the current time still works.
        assert!(sim.schedule(VirtualTime::new(50), EventType::Noop).is_ok());
    }

    #[test]
    fn test_context_rejects_past_schedule() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::new(20), EventType::Noop).unwrap();

        let mut result = None;
        sim.run(&mut |ctx: &mut SimulationContext, _event: &Event| {
            result = Some(ctx.schedule_at(VirtualTime::new(5), EventType::Noop));
        });
        assert!(matches!(result, Some(Err(SimError::InvalidSchedule { .. }))));
    }

    #[test]
    fn test_equal_time_events_fire_in_submission_order() {
        let mut sim = Simulation::new();
        let at = VirtualTime::from_secs(6);
        sim.schedule(at, EventType::Log("down".into())).unwrap();
        sim.schedule(at, EventType::Log("up".into())).unwrap();
        sim.schedule(VirtualTime::from_secs(5), EventType::Log("before".into())).unwrap();

        let mut order = Vec::new();
        sim.run(&mut |_ctx: &mut SimulationContext, event: &Event| {
            if let EventType::Log(msg) = &event.payload {
                order.push(msg.clone());
            }
        });
        assert_eq!(order, vec!["before", "down", "up"]);
    }

    #[test]
    fn test_cancelled_event_never_fires() {
        let mut sim = Simulation::new();
        let id = sim.schedule(VirtualTime::new(10), EventType::Log("x".into())).unwrap();
        sim.schedule(VirtualTime::new(5), EventType::Noop).unwrap();
        assert!(sim.cancel(id));

        let mut fired = 0;
        sim.run(&mut |_ctx: &mut SimulationContext, event: &Event| {
            if matches!(event.payload, EventType::Log(_)) {
                fired += 1;
            }
        });
        assert_eq!(fired, 0);
        assert_eq!(sim.events_processed(), 1);
    }

    #[test]
    fn test_handler_cancels_pending_event() {
        let mut sim = Simulation::new();
        sim.schedule(VirtualTime::new(1), EventType::Log("cancel".into())).unwrap();
        let victim = sim.schedule(VirtualTime::new(2), EventType::Log("victim".into())).unwrap();

        let mut seen = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext, event: &Event| {
            if let EventType::Log(msg) = &event.payload {
                seen.push(msg.clone());
                if msg == "cancel" {
                    assert!(ctx.cancel(victim));
                }
            }
        });
        assert_eq!(seen, vec!["cancel"]);
    }

    #[test]
    fn test_run_until_stops_at_time() {
        let mut sim = Simulation::new();
        for t in [1u64, 5, 10, 15] {
            sim.schedule(VirtualTime::new(t), EventType::Noop).unwrap();
        }

        let processed = sim.run_until(VirtualTime::new(10), &mut noop());
        assert_eq!(processed, 3);
        assert_eq!(sim.current_time(), VirtualTime::new(10));
        assert_eq!(sim.pending_count(), 1);

        // Past the last event: clock still moves to the stop time.
        sim.run_until(VirtualTime::new(40), &mut noop());
        assert_eq!(sim.current_time(), VirtualTime::new(40));
        assert!(sim.is_finished());
    }

    #[test]
    fn test_run_for_limits_steps() {
        let mut sim = Simulation::new();
        for i in 0..100 {
            sim.schedule(VirtualTime::new(i), EventType::Noop).unwrap();
        }
        let processed = sim.run_for(10, &mut noop());
        assert_eq!(processed, 10);
        assert!(!sim.is_finished());
    }

    #[test]
    fn test_time_monotonicity() {
        let mut sim = Simulation::new();
        for t in [100u64, 50, 75, 10] {
            sim.schedule(VirtualTime::new(t), EventType::Noop).unwrap();
        }

        let mut times: Vec<u64> = Vec::new();
        sim.run(&mut |ctx: &mut SimulationContext, _event: &Event| {
            times.push(ctx.now().ticks());
        });
        assert_eq!(times, vec![10, 50, 75, 100]);
    }

    #[test]
    fn test_replay_reseeds_external_events_only() {
        let mut sim = Simulation::new();
        sim.enable_logging();
        sim.schedule(VirtualTime::new(3), EventType::Log("a".into())).unwrap();
        sim.schedule(VirtualTime::new(3), EventType::Log("b".into())).unwrap();
        sim.run(&mut |ctx: &mut SimulationContext, event: &Event| {
            if event.payload == EventType::Log("a".into()) {
                ctx.schedule_after(1, EventType::Log("follow".into()));
            }
        });
        let log = sim.event_log().unwrap();
        assert_eq!(log.len(), 3);

        // Plain log events are not derived, so the follow-up is re-seeded too.
        let mut replay = Simulation::replay(log);
        assert_eq!(replay.pending_count(), 3);
        replay.run(&mut noop());
        assert!(logs_match(log, replay.event_log().unwrap()));
    }

    #[test]
    fn test_replay_mints_around_original_ids() {
        let mut sim = Simulation::new();
        sim.enable_logging();
        sim.schedule(VirtualTime::new(1), EventType::Noop).unwrap();
        let dropped = sim.schedule(VirtualTime::new(2), EventType::Log("never".into())).unwrap();
        sim.schedule(VirtualTime::new(5), EventType::DumpRoutes).unwrap();
        sim.cancel(dropped);
        sim.run(&mut noop());

        let mut replay = Simulation::replay(sim.event_log().unwrap());
        replay.run(&mut noop());
        let ids: Vec<u64> = replay.event_log().unwrap().events().iter().map(|e| e.id.raw()).collect();
        assert_eq!(ids, vec![0, 2]);

        // The cancelled event's ID stays spent.
        let next = replay.schedule(VirtualTime::new(9), EventType::Noop).unwrap();
        assert_eq!(next.raw(), 3);
    }

    #[test]
    fn test_empty_simulation() {
        let mut sim = Simulation::new();
        assert_eq!(sim.run(&mut noop()), 0);
        assert!(sim.is_finished());
    }
}

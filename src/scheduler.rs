/// Deterministic event scheduler.
///
/// Uses a `BinaryHeap` with reversed `Ord` on `Event` as a min-heap keyed
/// by `(scheduled_at, event_id)`. Event IDs are strictly increasing, so
/// equal-time events pop in submission order. Replay re-inserts events
/// under their original IDs, which keeps that order across runs.
///
/// Cancellation is lazy: a cancelled ID is remembered and the event is
/// discarded when it reaches the top of the heap.

use std::collections::{BTreeSet, BinaryHeap};

use crate::event::{Event, EventId, EventIdGen, EventType};
use crate::time::VirtualTime;

/// The core deterministic scheduler.
///
/// Owns the event queue and the ID generator. All scheduling goes through
/// this struct to ensure monotonic IDs and deterministic ordering. It
/// does not know the current time; causality is checked by `Simulation`.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    /// Min-heap (via reversed Ord on Event).
    queue: BinaryHeap<Event>,

    id_gen: EventIdGen,

    /// IDs of queued events that must not fire.
    cancelled: BTreeSet<EventId>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a new event at the given virtual time.
    pub fn schedule(&mut self, at: VirtualTime, payload: EventType) -> EventId {
        let id = self.id_gen.next_id();
        self.queue.push(Event::new(id, at, payload));
        id
    }

    /// Queue an event under an ID minted by an earlier run. The generator
    /// will not hand that ID out again.
    pub(crate) fn schedule_with_id(&mut self, id: EventId, at: VirtualTime, payload: EventType) {
        self.id_gen.reserve(id);
        self.queue.push(Event::new(id, at, payload));
    }

    /// Keep `id` out of circulation without queueing anything under it.
    pub(crate) fn reserve_id(&mut self, id: EventId) {
        self.id_gen.reserve(id);
    }

    /// Cancel a pending event. Returns `false` if the event already fired,
    /// was already cancelled, or never existed.
    pub fn cancel(&mut self, id: EventId) -> bool {
        if self.cancelled.contains(&id) || !self.queue.iter().any(|e| e.id == id) {
            return false;
        }
        self.cancelled.insert(id);
        true
    }

    /// Whether `id` is queued and not cancelled.
    pub fn is_pending(&self, id: EventId) -> bool {
        !self.cancelled.contains(&id) && self.queue.iter().any(|e| e.id == id)
    }

    /// Pop the next live event (earliest time, lowest ID).
    pub fn pop_next(&mut self) -> Option<Event> {
        while let Some(event) = self.queue.pop() {
            if self.cancelled.remove(&event.id) {
                continue;
            }
            return Some(event);
        }
        None
    }

    /// Peek at the next live event without removing it.
    pub fn peek_next(&mut self) -> Option<&Event> {
        while let Some(top) = self.queue.peek() {
            if self.cancelled.contains(&top.id) {
                let id = top.id;
                self.queue.pop();
                self.cancelled.remove(&id);
            } else {
                break;
            }
        }
        self.queue.peek()
    }

    /// Returns `true` if no live events remain.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of live (not cancelled) pending events.
    pub fn len(&self) -> usize {
        self.queue.len() - self.cancelled.len()
    }

    /// Returns the next event ID that will be assigned.
    pub fn next_event_id(&self) -> EventId {
        self.id_gen.peek()
    }

    /// Drain all live events in dispatch order.
    pub fn drain_ordered(&mut self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.len());
        while let Some(e) = self.pop_next() {
            events.push(e);
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_at_same_time() {
        let mut sched = Scheduler::new();

        sched.schedule(VirtualTime::new(10), EventType::Log("first".into()));
        sched.schedule(VirtualTime::new(10), EventType::Log("second".into()));
        sched.schedule(VirtualTime::new(10), EventType::Log("third".into()));

        let e1 = sched.pop_next().unwrap();
        let e2 = sched.pop_next().unwrap();
        let e3 = sched.pop_next().unwrap();

        assert!(e1.id < e2.id);
        assert!(e2.id < e3.id);
        assert_eq!(e1.payload, EventType::Log("first".into()));
        assert_eq!(e2.payload, EventType::Log("second".into()));
        assert_eq!(e3.payload, EventType::Log("third".into()));
    }

    #[test]
    fn test_time_ordering() {
        let mut sched = Scheduler::new();

        sched.schedule(VirtualTime::new(30), EventType::Log("late".into()));
        sched.schedule(VirtualTime::new(10), EventType::Log("early".into()));
        sched.schedule(VirtualTime::new(20), EventType::Log("mid".into()));

        let times: Vec<u64> = sched
            .drain_ordered()
            .iter()
            .map(|e| e.scheduled_at.ticks())
            .collect();
        assert_eq!(times, vec![10, 20, 30]);
    }

    #[test]
    fn test_cancel_skips_event() {
        let mut sched = Scheduler::new();
        let a = sched.schedule(VirtualTime::new(5), EventType::Log("a".into()));
        let b = sched.schedule(VirtualTime::new(5), EventType::Log("b".into()));
        sched.schedule(VirtualTime::new(6), EventType::Log("c".into()));

        assert!(sched.cancel(b));
        assert!(!sched.cancel(b), "double cancel must report false");
        assert!(!sched.is_pending(b));
        assert!(sched.is_pending(a));
        assert_eq!(sched.len(), 2);

        let order: Vec<EventType> = sched.drain_ordered().into_iter().map(|e| e.payload).collect();
        assert_eq!(
            order,
            vec![EventType::Log("a".into()), EventType::Log("c".into())]
        );
        assert!(sched.is_empty());
    }

    #[test]
    fn test_cancel_fired_or_unknown_event() {
        let mut sched = Scheduler::new();
        let a = sched.schedule(VirtualTime::new(1), EventType::Noop);
        sched.pop_next().unwrap();
        assert!(!sched.cancel(a));
        assert!(!sched.cancel(EventId::new(99)));
        assert_eq!(sched.len(), 0);
    }

    #[test]
    fn test_original_ids_keep_tie_order() {
        let mut sched = Scheduler::new();
        sched.schedule_with_id(EventId::new(1), VirtualTime::new(10), EventType::Log("seeded".into()));
        sched.reserve_id(EventId::new(2));

        // Minted IDs step around the seeded and reserved ones.
        let minted = sched.schedule(VirtualTime::new(10), EventType::Log("minted".into()));
        let later = sched.schedule(VirtualTime::new(10), EventType::Log("later".into()));
        assert_eq!(minted.raw(), 0);
        assert_eq!(later.raw(), 3);
        assert_eq!(sched.next_event_id().raw(), 4);

        let order: Vec<EventType> = sched.drain_ordered().into_iter().map(|e| e.payload).collect();
        assert_eq!(
            order,
            vec![
                EventType::Log("minted".into()),
                EventType::Log("seeded".into()),
                EventType::Log("later".into()),
            ]
        );
    }

    #[test]
    fn test_cancel_event_with_original_id() {
        let mut sched = Scheduler::new();
        let high = EventId::new(50);
        sched.schedule_with_id(high, VirtualTime::new(1), EventType::Noop);
        assert!(sched.cancel(high));
        assert!(sched.is_empty());
    }

    #[test]
    fn test_peek_skips_cancelled_head() {
        let mut sched = Scheduler::new();
        let a = sched.schedule(VirtualTime::new(1), EventType::Noop);
        sched.schedule(VirtualTime::new(2), EventType::DumpRoutes);
        sched.cancel(a);
        assert_eq!(sched.peek_next().unwrap().payload, EventType::DumpRoutes);
        assert_eq!(sched.len(), 1);
    }

    #[test]
    fn test_determinism_across_runs() {
        fn build_schedule() -> Vec<(u64, u64)> {
            let mut sched = Scheduler::new();
            sched.schedule(VirtualTime::new(5), EventType::Log("a".into()));
            sched.schedule(VirtualTime::new(3), EventType::Log("b".into()));
            let c = sched.schedule(VirtualTime::new(5), EventType::Log("c".into()));
            sched.schedule(VirtualTime::new(1), EventType::Log("d".into()));
            sched.schedule(VirtualTime::new(3), EventType::Log("e".into()));
            sched.cancel(c);
            sched
                .drain_ordered()
                .iter()
                .map(|e| (e.scheduled_at.ticks(), e.id.raw()))
                .collect()
        }

        assert_eq!(build_schedule(), build_schedule());
    }
}

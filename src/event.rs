/// Event system for the discrete-event simulator.
///
/// Every timed effect is an `Event`: an immutable record placed on the
/// scheduler's priority queue and dispatched in deterministic order.

use crate::runtime::Packet;
use crate::time::VirtualTime;
use crate::topology::{IfIndex, NodeId};
use std::cmp::Ordering;
use std::collections::BTreeSet;

// ── Event ID ──────────────────────────────────────────────────────────

/// A globally unique, strictly-increasing event identifier.
///
/// Breaks ties in the scheduler: two events at the same `VirtualTime`
/// are ordered by `EventId`, which is submission order. Also serves as
/// the cancellation handle.
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
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "E#{}", self.0)
    }
}

// ── Event ID Generator ───────────────────────────────────────────────

/// Deterministic, strictly-increasing event-ID generator.
///
/// Each `Scheduler` owns exactly one. The simulation is single-threaded,
/// so the counter is trivially deterministic. IDs handed out elsewhere
/// (replayed events) can be reserved; the generator steps over them.
#[derive(Debug, Clone, Default)]
pub struct EventIdGen {
    next: u64,
    reserved: BTreeSet<EventId>,
}

impl EventIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint the next event ID.
    pub fn next_id(&mut self) -> EventId {
        while self.reserved.remove(&EventId(self.next)) {
            self.next += 1;
        }
        let id = EventId(self.next);
        self.next += 1;
        id
    }

    /// Peek at the next ID without consuming it.
    pub fn peek(&self) -> EventId {
        let mut next = self.next;
        while self.reserved.contains(&EventId(next)) {
            next += 1;
        }
        EventId(next)
    }

    /// Never mint `id`. Already-passed IDs are ignored.
    pub fn reserve(&mut self, id: EventId) {
        if id.0 >= self.next {
            self.reserved.insert(id);
        }
    }
}

// ── Event Type ────────────────────────────────────────────────────────

/// The payload of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum EventType {
    /// Does nothing. Handy as a heartbeat or a placeholder.
    Noop,

    /// A free-form trace marker.
    Log(String),

    /// Administratively bring an interface down.
    InterfaceDown { node: NodeId, interface: IfIndex },

    /// Administratively bring an interface up.
    InterfaceUp { node: NodeId, interface: IfIndex },

    /// A traffic source hands `packet` to `node`'s forwarding engine.
    PacketSend { node: NodeId, packet: Packet },

    /// `packet` finished crossing a link and reaches `node` on
    /// `interface`. Only ever scheduled by the forwarding engine.
    PacketArrival {
        node: NodeId,
        interface: IfIndex,
        packet: Packet,
    },

    /// Snapshot every node's routing table.
    DumpRoutes,
}

impl EventType {
    /// Whether the event is produced by the simulation itself rather than
    /// injected from outside. Replay re-seeds only non-derived events.
    pub fn is_derived(&self) -> bool {
        matches!(self, EventType::PacketArrival { .. })
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Noop => write!(f, "Noop"),
            EventType::Log(msg) => write!(f, "Log({})", msg),
            EventType::InterfaceDown { node, interface } => {
                write!(f, "SetDown({}/{})", node, interface)
            }
            EventType::InterfaceUp { node, interface } => {
                write!(f, "SetUp({}/{})", node, interface)
            }
            EventType::PacketSend { node, packet } => {
                write!(f, "Send({} → {}, {})", node, packet.destination, packet.id)
            }
            EventType::PacketArrival {
                node,
                interface,
                packet,
            } => write!(f, "Arrive({}/{}, {})", node, interface, packet.id),
            EventType::DumpRoutes => write!(f, "DumpRoutes"),
        }
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A single simulation event, ordered by `(scheduled_at, id)`.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    /// Unique identifier (monotonically increasing).
    pub id: EventId,

    /// The virtual time at which this event should be dispatched.
    pub scheduled_at: VirtualTime,

    pub payload: EventType,
}

impl Event {
    pub fn new(id: EventId, scheduled_at: VirtualTime, payload: EventType) -> Self {
        Event {
            id,
            scheduled_at,
            payload,
        }
    }
}

/// Ordering: smallest `(scheduled_at, id)` first.
///
/// `BinaryHeap` is a max-heap, so the natural ordering is reversed here
/// to turn it into a min-heap.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .scheduled_at
            .cmp(&self.scheduled_at)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

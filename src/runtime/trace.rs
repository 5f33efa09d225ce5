//! Structured notifications emitted by the network runtime.
//!
//! The runtime never performs I/O for tracing. It appends a
//! [`TraceEntry`] to its own trace and hands the same entry to every
//! subscribed [`TraceSink`].

use crate::event::EventId;
use crate::time::VirtualTime;
use crate::topology::{IfIndex, NodeId};

use super::packet::PacketId;

/// Why a packet left the network without being delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum DropReason {
    /// No routing entry covers the destination.
    NoRoute,
    /// The chosen outgoing interface is down.
    EgressDown,
    /// The receiving interface went down while the packet was in flight.
    IngressDown,
    /// The hop limit reached zero.
    TtlExpired,
    /// No endpoint on the outgoing link owns the next-hop address.
    Unresolved,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DropReason::NoRoute => "no-route",
            DropReason::EgressDown => "egress-down",
            DropReason::IngressDown => "ingress-down",
            DropReason::TtlExpired => "ttl-expired",
            DropReason::Unresolved => "unresolved",
        };
        f.write_str(s)
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TraceEvent {
    /// A packet was put on `interface`'s link and will reach the next
    /// hop at `arrival`.
    Enqueue {
        packet: PacketId,
        interface: IfIndex,
        arrival: VirtualTime,
    },
    Deliver { packet: PacketId },
    Drop { packet: PacketId, reason: DropReason },
    InterfaceUp { interface: IfIndex },
    InterfaceDown { interface: IfIndex },
    /// Routing tables were rebuilt. `global` is false when only the
    /// connected routes were refreshed.
    RoutesRecomputed { global: bool },
}

impl std::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceEvent::Enqueue {
                packet,
                interface,
                arrival,
            } => write!(f, "enqueue {} on {} (arrives {})", packet, interface, arrival),
            TraceEvent::Deliver { packet } => write!(f, "deliver {}", packet),
            TraceEvent::Drop { packet, reason } => write!(f, "drop {} ({})", packet, reason),
            TraceEvent::InterfaceUp { interface } => write!(f, "{} up", interface),
            TraceEvent::InterfaceDown { interface } => write!(f, "{} down", interface),
            TraceEvent::RoutesRecomputed { global: true } => write!(f, "routes recomputed"),
            TraceEvent::RoutesRecomputed { global: false } => {
                write!(f, "connected routes refreshed")
            }
        }
    }
}

/// A record of one observable action at one node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry {
    /// Virtual time of the action.
    pub time: VirtualTime,
    /// The dispatched event that caused it; `None` for calls made
    /// outside the event loop.
    pub event_id: Option<EventId>,
    pub node: NodeId,
    pub event: TraceEvent,
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[T={} ", self.time.ticks())?;
        match self.event_id {
            Some(id) => write!(f, "E=#{}", id.raw())?,
            None => write!(f, "E=-")?,
        }
        write!(f, " N={}] {}", self.node, self.event)
    }
}

/// Receives every trace entry as it is produced.
pub trait TraceSink {
    fn record(&mut self, entry: &TraceEntry);
}

/// Any closure over `&TraceEntry` is a sink.
impl<F> TraceSink for F
where
    F: FnMut(&TraceEntry),
{
    fn record(&mut self, entry: &TraceEntry) {
        (self)(entry);
    }
}

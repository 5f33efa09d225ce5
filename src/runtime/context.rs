//! `SimulationContext` extensions for network-level scheduling.

use crate::event::{EventId, EventType};
use crate::simulation::SimulationContext;
use crate::topology::{IfIndex, NodeId};

use super::packet::Packet;

/// Extension methods on `SimulationContext` for interface transitions,
/// traffic, and route dumps. Delays are in ticks from now.
impl SimulationContext<'_> {
    /// Schedule `SetDown` on `node`'s `interface` after `delay` ticks.
    pub fn schedule_interface_down(&mut self, node: NodeId, interface: IfIndex, delay: u64) -> EventId {
        self.schedule_after(delay, EventType::InterfaceDown { node, interface })
    }

    /// Schedule `SetUp` on `node`'s `interface` after `delay` ticks.
    pub fn schedule_interface_up(&mut self, node: NodeId, interface: IfIndex, delay: u64) -> EventId {
        self.schedule_after(delay, EventType::InterfaceUp { node, interface })
    }

    /// Hand `packet` to `node`'s forwarding engine at the current time.
    pub fn send_packet(&mut self, node: NodeId, packet: Packet) -> EventId {
        self.schedule_after(0, EventType::PacketSend { node, packet })
    }

    /// Snapshot every routing table after `delay` ticks.
    pub fn schedule_route_dump(&mut self, delay: u64) -> EventId {
        self.schedule_after(delay, EventType::DumpRoutes)
    }
}

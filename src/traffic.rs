/// Traffic sources.
///
/// A [`Flow`] is a pre-expanded packet schedule: installing it puts one
/// `PacketSend` event per packet on the queue, so flows replay exactly
/// and can be cut short by cancelling the remaining events.

use std::net::Ipv4Addr;

use crate::error::SimResult;
use crate::event::{EventId, EventType};
use crate::runtime::{NetworkRuntime, Packet};
use crate::simulation::Simulation;
use crate::time::VirtualTime;
use crate::topology::{DataRate, NodeId};

/// When a flow is allowed to transmit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum FlowPattern {
    /// Sends for the whole `[start, stop)` window.
    Constant,
    /// Alternates `off` then `on` periods (in ticks), starting with
    /// `off` at the flow's start time.
    OnOff { on: u64, off: u64 },
}

/// A stream of equal-size packets from one node to one address.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Flow {
    pub source: NodeId,
    pub destination: Ipv4Addr,
    /// Application bytes per packet; the wire size adds UDP/IP headers.
    pub payload_size: u32,
    pub rate: DataRate,
    pub start: VirtualTime,
    pub stop: VirtualTime,
    pub pattern: FlowPattern,
}

impl Flow {
    /// A constant-rate flow over `[start, stop)`.
    pub fn constant(
        source: NodeId,
        destination: Ipv4Addr,
        rate: DataRate,
        payload_size: u32,
        start: VirtualTime,
        stop: VirtualTime,
    ) -> Self {
        Flow {
            source,
            destination,
            payload_size,
            rate,
            start,
            stop,
            pattern: FlowPattern::Constant,
        }
    }

    /// Switch to an on/off pattern.
    pub fn on_off(mut self, on: u64, off: u64) -> Self {
        self.pattern = FlowPattern::OnOff { on, off };
        self
    }

    /// Gap between packets while the flow is on: one payload at `rate`.
    pub fn interval(&self) -> u64 {
        self.rate.transmission_time(self.payload_size).max(1)
    }

    /// Every send time, in order. The first packet leaves one interval
    /// after each on period begins.
    pub fn send_times(&self) -> Vec<VirtualTime> {
        let interval = self.interval();
        let stop = self.stop.ticks();
        let mut times = Vec::new();

        let (on, off) = match self.pattern {
            FlowPattern::Constant => (stop.saturating_sub(self.start.ticks()), 0),
            FlowPattern::OnOff { on, off } => (on, off),
        };
        if on == 0 {
            return times;
        }

        let mut period_start = self.start.ticks();
        while period_start < stop {
            let on_start = period_start.saturating_add(off);
            let on_end = on_start.saturating_add(on).min(stop);
            let mut t = on_start.saturating_add(interval);
            while t < on_end {
                times.push(VirtualTime::new(t));
                t = t.saturating_add(interval);
            }
            let next = on_start.saturating_add(on);
            if next <= period_start {
                break;
            }
            period_start = next;
        }
        times
    }

    /// Schedule every packet of the flow. Packet IDs come from `runtime`.
    pub fn install(
        &self,
        sim: &mut Simulation,
        runtime: &mut NetworkRuntime,
    ) -> SimResult<FlowHandle> {
        let mut events = Vec::new();
        for at in self.send_times() {
            let packet = Packet::with_payload(
                runtime.next_packet_id(),
                self.destination,
                vec![0; self.payload_size as usize],
            );
            let id = sim.schedule(
                at,
                EventType::PacketSend {
                    node: self.source,
                    packet,
                },
            )?;
            events.push((at, id));
        }
        Ok(FlowHandle { events })
    }
}

/// The scheduled sends of an installed flow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowHandle {
    events: Vec<(VirtualTime, EventId)>,
}

impl FlowHandle {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn event_ids(&self) -> impl Iterator<Item = EventId> + '_ {
        self.events.iter().map(|(_, id)| *id)
    }

    /// Cancel every send at or after `from`. Returns how many were
    /// still pending.
    pub fn cancel_from(&self, sim: &mut Simulation, from: VirtualTime) -> usize {
        self.events
            .iter()
            .filter(|(at, _)| *at >= from)
            .filter(|(_, id)| sim.cancel(*id))
            .count()
    }
}

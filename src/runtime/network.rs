//! `NetworkRuntime`: owns the topology and routing tables and reacts to
//! dispatched events.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use tracing::{debug, info, warn};

use crate::config::NetworkConfig;
use crate::error::SimResult;
use crate::event::{Event, EventId, EventType};
use crate::eventlog::hash_combine;
use crate::routing::{compute_tables, connected_routes, RoutingTable};
use crate::simulation::{EventHandler, SimulationContext};
use crate::time::VirtualTime;
use crate::topology::{
    IfIndex, InterfaceStatus, LinkConfig, LinkId, LinkKind, NodeId, Topology,
};

use super::packet::{Packet, PacketId, PacketIdGen};
use super::trace::{DropReason, TraceEntry, TraceEvent, TraceSink};

// ── Counters ──────────────────────────────────────────────────────────

/// Forwarding counters, updated as packets move.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ForwardingStats {
    /// Packets handed to the network by a traffic source.
    pub sent: u64,
    /// Per-hop transmissions onto a link.
    pub transmitted: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub drops_by_reason: BTreeMap<DropReason, u64>,
}

impl ForwardingStats {
    pub fn drops(&self, reason: DropReason) -> u64 {
        self.drops_by_reason.get(&reason).copied().unwrap_or(0)
    }
}

/// What `forward` did with a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The node owns the destination address.
    Delivered,
    /// Put on the wire towards `next_hop`.
    Enqueued {
        interface: IfIndex,
        next_hop: NodeId,
        arrival: VirtualTime,
    },
    Dropped(DropReason),
}

/// Every node's table as of one `DumpRoutes` event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteDump {
    pub time: VirtualTime,
    pub tables: Vec<RoutingTable>,
}

// ── NetworkRuntime ────────────────────────────────────────────────────

/// The interface state machine and forwarding engine.
///
/// Implements [`EventHandler`] so it can be passed directly to
/// [`Simulation::run`](crate::simulation::Simulation::run). The topology
/// is frozen and routing tables are populated when the first event is
/// dispatched, unless [`populate_routing_tables`](Self::populate_routing_tables)
/// was called earlier.
pub struct NetworkRuntime {
    topology: Topology,
    config: NetworkConfig,
    /// Replaced wholesale on every recompute, never patched.
    tables: BTreeMap<NodeId, RoutingTable>,
    populated: bool,
    recompute_count: u64,
    /// Point-to-point links: when each interface finishes its current
    /// transmission.
    iface_busy: BTreeMap<(NodeId, IfIndex), VirtualTime>,
    /// Shared links: when the medium is next free.
    link_busy: BTreeMap<LinkId, VirtualTime>,
    stats: ForwardingStats,
    packet_ids: PacketIdGen,
    route_dumps: Vec<RouteDump>,
    sinks: Vec<Box<dyn TraceSink>>,
    /// Time of the last dispatched event.
    clock: VirtualTime,
    /// The event being dispatched, if any.
    cause: Option<EventId>,
    /// Append-only trace of every observable action.
    pub trace: Vec<TraceEntry>,
}

impl NetworkRuntime {
    /// An empty network with the default (reactive) configuration.
    pub fn new() -> Self {
        Self::with_config(NetworkConfig::default())
    }

    pub fn with_config(config: NetworkConfig) -> Self {
        Self::from_topology(Topology::new(), config)
    }

    /// Wrap a prebuilt topology.
    pub fn from_topology(topology: Topology, config: NetworkConfig) -> Self {
        NetworkRuntime {
            topology,
            config,
            tables: BTreeMap::new(),
            populated: false,
            recompute_count: 0,
            iface_busy: BTreeMap::new(),
            link_busy: BTreeMap::new(),
            stats: ForwardingStats::default(),
            packet_ids: PacketIdGen::new(),
            route_dumps: Vec::new(),
            sinks: Vec::new(),
            clock: VirtualTime::ZERO,
            cause: None,
            trace: Vec::new(),
        }
    }

    // ── Topology construction ─────────────────────────────────────

    pub fn add_node(&mut self) -> SimResult<NodeId> {
        self.topology.add_node()
    }

    pub fn add_link(&mut self, nodes: &[NodeId], config: LinkConfig) -> SimResult<LinkId> {
        self.topology.add_link(nodes, config)
    }

    pub fn assign_address(
        &mut self,
        node: NodeId,
        interface: IfIndex,
        addr: Ipv4Addr,
        prefix_len: u8,
    ) -> SimResult<()> {
        self.topology.assign_address(node, interface, addr, prefix_len)
    }

    pub fn assign_subnet(&mut self, link: LinkId, subnet: Ipv4Net) -> SimResult<Vec<Ipv4Addr>> {
        self.topology.assign_subnet(link, subnet)
    }

    pub fn set_metric(&mut self, node: NodeId, interface: IfIndex, metric: u32) -> SimResult<()> {
        self.topology.set_metric(node, interface, metric)
    }

    /// Register a sink that sees every trace entry from now on.
    pub fn subscribe<S: TraceSink + 'static>(&mut self, sink: S) {
        self.sinks.push(Box::new(sink));
    }

    /// Mint a packet ID unique within this runtime.
    pub fn next_packet_id(&mut self) -> PacketId {
        self.packet_ids.next_id()
    }

    // ── Routing ───────────────────────────────────────────────────

    /// Compute every node's table from the current topology and freeze
    /// the topology. Counts as a recompute.
    pub fn populate_routing_tables(&mut self) {
        self.topology.freeze();
        self.tables = compute_tables(&self.topology);
        self.populated = true;
        self.recompute_count += 1;
        info!(
            nodes = self.topology.node_count(),
            links = self.topology.links().len(),
            "routing tables populated"
        );
    }

    fn ensure_started(&mut self) {
        if !self.populated {
            self.populate_routing_tables();
        }
    }

    /// Rebuild tables after an effective transition at `trigger`.
    fn recompute(&mut self, trigger: NodeId) {
        if !self.populated {
            return;
        }
        let global = self.config.respond_to_interface_events;
        if global {
            self.tables = compute_tables(&self.topology);
            self.recompute_count += 1;
            info!(recomputes = self.recompute_count, at = %self.clock, "global routes recomputed");
        } else {
            let topology = &self.topology;
            self.tables = self
                .tables
                .iter()
                .map(|(id, t)| (*id, t.with_connected(connected_routes(topology, *id))))
                .collect();
            debug!(at = %self.clock, "connected routes refreshed");
        }
        self.emit(trigger, TraceEvent::RoutesRecomputed { global });
    }

    // ── Interface state machine ───────────────────────────────────

    /// Bring an interface up. Returns `true` if its status changed; a
    /// no-op transition triggers no recompute.
    pub fn set_up(&mut self, node: NodeId, interface: IfIndex) -> SimResult<bool> {
        self.transition(node, interface, InterfaceStatus::Up)
    }

    /// Bring an interface down. Returns `true` if its status changed.
    pub fn set_down(&mut self, node: NodeId, interface: IfIndex) -> SimResult<bool> {
        self.transition(node, interface, InterfaceStatus::Down)
    }

    fn transition(
        &mut self,
        node: NodeId,
        interface: IfIndex,
        status: InterfaceStatus,
    ) -> SimResult<bool> {
        if !self.topology.set_status(node, interface, status)? {
            debug!(%node, %interface, %status, "interface already in requested state");
            return Ok(false);
        }
        info!(%node, %interface, %status, at = %self.clock, "interface transition");
        let event = match status {
            InterfaceStatus::Up => TraceEvent::InterfaceUp { interface },
            InterfaceStatus::Down => TraceEvent::InterfaceDown { interface },
        };
        self.emit(node, event);
        self.recompute(node);
        Ok(true)
    }

    pub fn is_up(&self, node: NodeId, interface: IfIndex) -> SimResult<bool> {
        Ok(self.topology.interface(node, interface)?.is_up())
    }

    // ── Forwarding engine ─────────────────────────────────────────

    /// Route `packet` at `node`: deliver it locally, put it on the
    /// chosen link, or drop it.
    ///
    /// Arrival at the next hop is scheduled at
    /// `max(now, busy_until) + size/rate + delay`, where `busy_until`
    /// belongs to the sending interface on a point-to-point link and to
    /// the whole medium on a shared one.
    pub fn forward(
        &mut self,
        ctx: &mut SimulationContext,
        node: NodeId,
        packet: Packet,
    ) -> SimResult<ForwardOutcome> {
        if self.topology.node(node)?.owns_address(packet.destination) {
            self.stats.delivered += 1;
            debug!(%node, packet = %packet.id, "delivered");
            self.emit(node, TraceEvent::Deliver { packet: packet.id });
            return Ok(ForwardOutcome::Delivered);
        }

        let Some(route) = self
            .tables
            .get(&node)
            .and_then(|t| t.lookup(packet.destination))
            .cloned()
        else {
            return Ok(self.drop_packet(node, packet.id, DropReason::NoRoute));
        };

        let egress = self.topology.interface(node, route.interface)?;
        if !egress.is_up() {
            return Ok(self.drop_packet(node, packet.id, DropReason::EgressDown));
        }
        let link = self.topology.link(egress.link())?;
        let (kind, link_id, rate, delay) = (link.kind(), link.id(), link.rate(), link.delay());
        let next_hop_addr = route.gateway.unwrap_or(packet.destination);

        let receiver = match kind {
            LinkKind::PointToPoint => link.peers_of(node).next(),
            LinkKind::Shared => link.peers_of(node).find(|&(n, i)| {
                self.topology
                    .interface(n, i)
                    .is_ok_and(|iface| iface.ip() == Some(next_hop_addr))
            }),
        };
        let Some((next_hop, ingress)) = receiver else {
            return Ok(self.drop_packet(node, packet.id, DropReason::Unresolved));
        };

        let now = ctx.now();
        let busy = match kind {
            LinkKind::PointToPoint => self.iface_busy.get(&(node, route.interface)),
            LinkKind::Shared => self.link_busy.get(&link_id),
        }
        .copied()
        .unwrap_or(VirtualTime::ZERO);
        let start = if busy.is_before(now) { now } else { busy };
        let done = start.saturating_add(rate.transmission_time(packet.size));
        let arrival = done.saturating_add(delay);
        match kind {
            LinkKind::PointToPoint => {
                self.iface_busy.insert((node, route.interface), done);
            }
            LinkKind::Shared => {
                self.link_busy.insert(link_id, done);
            }
        }

        debug!(
            %node,
            packet = %packet.id,
            dst = %packet.destination,
            via = %route.interface,
            %next_hop,
            %arrival,
            "enqueued"
        );
        self.stats.transmitted += 1;
        self.emit(
            node,
            TraceEvent::Enqueue {
                packet: packet.id,
                interface: route.interface,
                arrival,
            },
        );
        ctx.schedule_at(
            arrival,
            EventType::PacketArrival {
                node: next_hop,
                interface: ingress,
                packet,
            },
        )?;

        Ok(ForwardOutcome::Enqueued {
            interface: route.interface,
            next_hop,
            arrival,
        })
    }

    /// A packet came off the wire at `node` on `interface`.
    fn receive(
        &mut self,
        ctx: &mut SimulationContext,
        node: NodeId,
        interface: IfIndex,
        mut packet: Packet,
    ) -> SimResult<ForwardOutcome> {
        if !self.is_up(node, interface)? {
            return Ok(self.drop_packet(node, packet.id, DropReason::IngressDown));
        }
        if !self.topology.node(node)?.owns_address(packet.destination) {
            packet.ttl = packet.ttl.saturating_sub(1);
            if packet.ttl == 0 {
                return Ok(self.drop_packet(node, packet.id, DropReason::TtlExpired));
            }
        }
        self.forward(ctx, node, packet)
    }

    fn drop_packet(&mut self, node: NodeId, packet: PacketId, reason: DropReason) -> ForwardOutcome {
        self.stats.dropped += 1;
        *self.stats.drops_by_reason.entry(reason).or_insert(0) += 1;
        debug!(%node, %packet, %reason, "dropped");
        self.emit(node, TraceEvent::Drop { packet, reason });
        ForwardOutcome::Dropped(reason)
    }

    fn dump_routes(&mut self) {
        info!(at = %self.clock, "routing table dump");
        for table in self.tables.values() {
            debug!("\n{}", table);
        }
        self.route_dumps.push(RouteDump {
            time: self.clock,
            tables: self.tables.values().cloned().collect(),
        });
    }

    fn emit(&mut self, node: NodeId, event: TraceEvent) {
        let entry = TraceEntry {
            time: self.clock,
            event_id: self.cause,
            node,
            event,
        };
        for sink in &mut self.sinks {
            sink.record(&entry);
        }
        self.trace.push(entry);
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn routing_table(&self, node: NodeId) -> Option<&RoutingTable> {
        self.tables.get(&node)
    }

    pub fn routing_tables(&self) -> &BTreeMap<NodeId, RoutingTable> {
        &self.tables
    }

    pub fn stats(&self) -> &ForwardingStats {
        &self.stats
    }

    /// Number of full table computations, including the initial one.
    pub fn recompute_count(&self) -> u64 {
        self.recompute_count
    }

    pub fn route_dumps(&self) -> &[RouteDump] {
        &self.route_dumps
    }
}

impl Default for NetworkRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for NetworkRuntime {
    fn handle(&mut self, ctx: &mut SimulationContext, event: &Event) {
        self.clock = ctx.now();
        self.cause = Some(event.id);
        self.ensure_started();

        let result = match &event.payload {
            EventType::InterfaceDown { node, interface } => {
                self.set_down(*node, *interface).map(|_| ())
            }
            EventType::InterfaceUp { node, interface } => {
                self.set_up(*node, *interface).map(|_| ())
            }
            EventType::PacketSend { node, packet } => {
                let mut packet = packet.clone();
                packet.ttl = self.config.default_ttl;
                self.stats.sent += 1;
                self.forward(ctx, *node, packet).map(|_| ())
            }
            EventType::PacketArrival {
                node,
                interface,
                packet,
            } => self
                .receive(ctx, *node, *interface, packet.clone())
                .map(|_| ()),
            EventType::DumpRoutes => {
                self.dump_routes();
                Ok(())
            }
            // System-level events carry no network semantics.
            EventType::Noop | EventType::Log(_) => Ok(()),
        };

        if let Err(e) = result {
            warn!(event = %event.payload, error = %e, "event could not be applied");
        }
        self.cause = None;
    }

    fn compute_state_hash(&self) -> u64 {
        let mut h: u64 = 0;
        for node in self.topology.nodes() {
            h = hash_combine(h, u64::from(node.id().raw()));
            for iface in node.interfaces() {
                h = hash_combine(h, u64::from(iface.is_up()));
            }
        }
        for table in self.tables.values() {
            for r in table.routes() {
                h = hash_combine(h, u64::from(u32::from(r.destination.network())));
                h = hash_combine(h, u64::from(r.destination.prefix_len()));
                h = hash_combine(h, r.gateway.map_or(0, |g| u64::from(u32::from(g))));
                h = hash_combine(h, u64::from(r.interface.raw()));
                h = hash_combine(h, r.metric);
            }
        }
        h = hash_combine(h, self.stats.transmitted);
        h = hash_combine(h, self.stats.delivered);
        hash_combine(h, self.stats.dropped)
    }
}

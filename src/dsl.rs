/// Fluent builder DSL for simulation setup.
///
/// Collects nodes, links, subnets, traffic and timed interface events,
/// then builds the `Simulation` + `NetworkRuntime` pair in one go.
/// Errors (bad rates, unknown nodes, address conflicts) surface from
/// `build`, not from the individual builder calls.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::config::NetworkConfig;
use crate::error::{SimError, SimResult};
use crate::event::EventType;
use crate::runtime::{NetworkRuntime, Packet};
use crate::simulation::Simulation;
use crate::time::VirtualTime;
use crate::topology::{DataRate, IfIndex, LinkConfig, LinkKind, NodeId};
use crate::traffic::{Flow, FlowHandle};

// ── SimulationBuilder ─────────────────────────────────────────────────

/// Fluent builder for constructing a `Simulation` + `NetworkRuntime` pair.
///
/// # Example
/// ```rust
/// use reroute::dsl::SimulationBuilder;
/// use reroute::VirtualTime;
///
/// let built = SimulationBuilder::new()
///     .nodes(3)
///     .point_to_point(0, 1, "5Mbps", 2)
///     .subnet("10.0.1.0/24")
///     .point_to_point(1, 2, "5Mbps", 2)
///     .subnet("10.0.2.0/24")
///     .send(0, "10.0.2.2", 50, VirtualTime::from_secs(1))
///     .interface_down(1, 1, VirtualTime::from_secs(2))
///     .build()
///     .unwrap();
/// ```
pub struct SimulationBuilder {
    config: NetworkConfig,
    node_count: u32,
    links: Vec<PlannedLink>,
    metrics: Vec<(u32, u32, u32)>,
    events: Vec<(VirtualTime, PlannedEvent)>,
    flows: Vec<Flow>,
    logging: LoggingConfig,
    /// First misuse of the chain, reported by `build`.
    misuse: Option<SimError>,
}

struct PlannedLink {
    nodes: Vec<u32>,
    kind: LinkKind,
    rate: String,
    delay_ms: u64,
    subnet: Option<String>,
}

/// Events whose packet IDs are minted at build time.
enum PlannedEvent {
    Raw(EventType),
    Send {
        node: u32,
        destination: String,
        payload_size: u32,
    },
}

#[derive(Clone, Copy)]
enum LoggingConfig {
    Off,
    On,
    WithCheckpoints(u64),
}

/// Everything `SimulationBuilder::build` produces.
pub struct BuiltSimulation {
    pub sim: Simulation,
    pub runtime: NetworkRuntime,
    /// Handles of installed flows, in the order they were added.
    pub flows: Vec<FlowHandle>,
}

impl SimulationBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        SimulationBuilder {
            config: NetworkConfig::default(),
            node_count: 0,
            links: Vec::new(),
            metrics: Vec::new(),
            events: Vec::new(),
            flows: Vec::new(),
            logging: LoggingConfig::Off,
            misuse: None,
        }
    }

    pub fn config(mut self, config: NetworkConfig) -> Self {
        self.config = config;
        self
    }

    // ── Topology ──────────────────────────────────────────────

    /// Create `count` more nodes, numbered after the existing ones.
    pub fn nodes(mut self, count: u32) -> Self {
        self.node_count += count;
        self
    }

    /// Connect `a` and `b` with a point-to-point link.
    pub fn point_to_point(mut self, a: u32, b: u32, rate: &str, delay_ms: u64) -> Self {
        self.links.push(PlannedLink {
            nodes: vec![a, b],
            kind: LinkKind::PointToPoint,
            rate: rate.into(),
            delay_ms,
            subnet: None,
        });
        self
    }

    /// Attach `nodes` to one shared medium.
    pub fn shared(mut self, nodes: &[u32], rate: &str, delay_ms: u64) -> Self {
        self.links.push(PlannedLink {
            nodes: nodes.to_vec(),
            kind: LinkKind::Shared,
            rate: rate.into(),
            delay_ms,
            subnet: None,
        });
        self
    }

    /// Number the most recently added link out of `subnet`. Calling this
    /// before any link makes `build` fail.
    pub fn subnet(mut self, subnet: &str) -> Self {
        match self.links.last_mut() {
            Some(link) => link.subnet = Some(subnet.into()),
            None => {
                self.misuse.get_or_insert_with(|| {
                    SimError::InvalidAddress(format!("subnet {} given before any link", subnet))
                });
            }
        }
        self
    }

    /// Set the routing cost of `node`'s `interface`.
    pub fn metric(mut self, node: u32, interface: u32, metric: u32) -> Self {
        self.metrics.push((node, interface, metric));
        self
    }

    // ── Logging ───────────────────────────────────────────────

    /// Enable event logging.
    pub fn with_logging(mut self) -> Self {
        self.logging = LoggingConfig::On;
        self
    }

    /// Enable event logging with checkpoint interval.
    pub fn with_checkpoints(mut self, interval: u64) -> Self {
        self.logging = LoggingConfig::WithCheckpoints(interval);
        self
    }

    // ── Events ────────────────────────────────────────────────

    pub fn interface_down(mut self, node: u32, interface: u32, at: VirtualTime) -> Self {
        self.events.push((
            at,
            PlannedEvent::Raw(EventType::InterfaceDown {
                node: NodeId::new(node),
                interface: IfIndex::new(interface),
            }),
        ));
        self
    }

    pub fn interface_up(mut self, node: u32, interface: u32, at: VirtualTime) -> Self {
        self.events.push((
            at,
            PlannedEvent::Raw(EventType::InterfaceUp {
                node: NodeId::new(node),
                interface: IfIndex::new(interface),
            }),
        ));
        self
    }

    /// Send one packet with `payload_size` application bytes.
    pub fn send(mut self, node: u32, destination: &str, payload_size: u32, at: VirtualTime) -> Self {
        self.events.push((
            at,
            PlannedEvent::Send {
                node,
                destination: destination.into(),
                payload_size,
            },
        ));
        self
    }

    pub fn flow(mut self, flow: Flow) -> Self {
        self.flows.push(flow);
        self
    }

    /// Snapshot every routing table at `at`.
    pub fn dump_routes(mut self, at: VirtualTime) -> Self {
        self.events.push((at, PlannedEvent::Raw(EventType::DumpRoutes)));
        self
    }

    /// Schedule a raw event.
    pub fn event(mut self, at: VirtualTime, event: EventType) -> Self {
        self.events.push((at, PlannedEvent::Raw(event)));
        self
    }

    // ── Build ─────────────────────────────────────────────────

    /// Build the topology, install traffic and schedule every event.
    /// Events are submitted in the order they were added, then flows.
    pub fn build(self) -> SimResult<BuiltSimulation> {
        if let Some(err) = self.misuse {
            return Err(err);
        }
        let mut sim = Simulation::new();
        let mut rt = NetworkRuntime::with_config(self.config);

        match self.logging {
            LoggingConfig::Off => {}
            LoggingConfig::On => sim.enable_logging(),
            LoggingConfig::WithCheckpoints(n) => sim.enable_logging_with_checkpoints(n),
        }

        for _ in 0..self.node_count {
            rt.add_node()?;
        }

        for plan in &self.links {
            let rate: DataRate = plan.rate.parse()?;
            let delay = VirtualTime::from_millis(plan.delay_ms).ticks();
            let config = match plan.kind {
                LinkKind::PointToPoint => LinkConfig::point_to_point(rate, delay),
                LinkKind::Shared => LinkConfig::shared(rate, delay),
            };
            let nodes: Vec<NodeId> = plan.nodes.iter().map(|&n| NodeId::new(n)).collect();
            let link = rt.add_link(&nodes, config)?;
            if let Some(subnet) = &plan.subnet {
                rt.assign_subnet(link, parse_subnet(subnet)?)?;
            }
        }

        for &(node, interface, metric) in &self.metrics {
            rt.set_metric(NodeId::new(node), IfIndex::new(interface), metric)?;
        }

        for (at, plan) in self.events {
            let event = match plan {
                PlannedEvent::Raw(event) => event,
                PlannedEvent::Send {
                    node,
                    destination,
                    payload_size,
                } => EventType::PacketSend {
                    node: NodeId::new(node),
                    packet: Packet::with_payload(
                        rt.next_packet_id(),
                        parse_addr(&destination)?,
                        vec![0; payload_size as usize],
                    ),
                },
            };
            sim.schedule(at, event)?;
        }

        let flows = self
            .flows
            .iter()
            .map(|f| f.install(&mut sim, &mut rt))
            .collect::<SimResult<Vec<_>>>()?;

        Ok(BuiltSimulation {
            sim,
            runtime: rt,
            flows,
        })
    }

    /// Build and run to completion. Returns the number of events
    /// processed alongside the built pair.
    pub fn run(self) -> SimResult<(BuiltSimulation, u64)> {
        let mut built = self.build()?;
        let n = built.sim.run(&mut built.runtime);
        Ok((built, n))
    }
}

impl Default for SimulationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_subnet(s: &str) -> SimResult<Ipv4Net> {
    s.parse()
        .map_err(|_| SimError::InvalidAddress(format!("bad subnet: {}", s)))
}

fn parse_addr(s: &str) -> SimResult<Ipv4Addr> {
    s.parse()
        .map_err(|_| SimError::InvalidAddress(format!("bad address: {}", s)))
}

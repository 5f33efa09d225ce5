//! # Reroute: Discrete-Event Network Simulation with Dynamic Routing
//!
//! A deterministic simulation core for small IP networks. Nodes,
//! point-to-point and shared links, global shortest-path routing that
//! is recomputed whenever an interface changes state, and a forwarding
//! engine that models transmission and propagation delay. No async, no
//! threads, no wall-clock time.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │        NetworkRuntime         │ ← interface state machine + forwarding
//! │  ┌────────────┐ ┌──────────┐  │
//! │  │  Topology  │ │ Routing  │  │ ← graph / per-node tables
//! │  └────────────┘ └──────────┘  │
//! │  ┌────────────────────────┐   │
//! │  │       Simulation        │   │ ← execution loop
//! │  │  ┌────────────┐        │   │
//! │  │  │ Scheduler  │        │   │ ← deterministic min-heap
//! │  │  └────────────┘        │   │
//! │  │  ┌────────────┐        │   │
//! │  │  │  Events    │        │   │ ← immutable event records
//! │  │  └────────────┘        │   │
//! │  └────────────────────────┘   │
//! └──────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod dsl;
pub mod error;
pub mod event;
pub mod eventlog;
pub mod routing;
pub mod runtime;
pub mod scenario;
pub mod scheduler;
pub mod simulation;
pub mod time;
pub mod topology;
pub mod traffic;

// Re-exports for convenience.
pub use api::SimulationApi;
pub use config::NetworkConfig;
pub use dsl::{BuiltSimulation, SimulationBuilder};
pub use error::{SimError, SimResult};
pub use event::{Event, EventId, EventIdGen, EventType};
pub use eventlog::{Checkpoint, EventLog};
pub use routing::{Route, RouteOrigin, RoutingTable};
pub use runtime::{
    DropReason, ForwardOutcome, ForwardingStats, NetworkRuntime, Packet, PacketId, TraceEntry,
    TraceEvent, TraceSink,
};
pub use scheduler::Scheduler;
pub use simulation::{EventHandler, Simulation, SimulationContext};
pub use time::VirtualTime;
pub use topology::{
    DataRate, IfIndex, Interface, InterfaceStatus, Link, LinkConfig, LinkId, LinkKind, NodeId,
    Topology,
};
pub use traffic::{Flow, FlowHandle, FlowPattern};

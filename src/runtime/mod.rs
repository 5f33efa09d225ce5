//! The network runtime: interface state machine and forwarding engine.
//!
//! [`NetworkRuntime`] owns the topology and every node's routing table.
//! It handles interface transitions, recomputes routes on effective
//! changes, and moves packets across links by scheduling their arrival.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`packet`] | [`Packet`], [`PacketId`], [`PacketIdGen`] |
//! | [`network`] | [`NetworkRuntime`], [`ForwardingStats`], [`ForwardOutcome`], [`RouteDump`] |
//! | [`trace`] | [`TraceEntry`], [`TraceEvent`], [`DropReason`], [`TraceSink`] |
//! | [`context`] | [`SimulationContext`](crate::simulation::SimulationContext) extensions |

pub mod context;
pub mod network;
pub mod packet;
pub mod trace;

pub use network::{ForwardOutcome, ForwardingStats, NetworkRuntime, RouteDump};
pub use packet::{Packet, PacketId, PacketIdGen, DEFAULT_TTL, HEADER_OVERHEAD};
pub use trace::{DropReason, TraceEntry, TraceEvent, TraceSink};

//! Structured error types for the simulator.
//!
//! All fallible public APIs return `SimResult<T>`. Packet drops are not
//! errors: they are counted and traced by the runtime.

use std::net::Ipv4Addr;

use thiserror::Error;

use crate::topology::{IfIndex, LinkId, NodeId};

/// The top-level error type for the simulator.
#[derive(Debug, Error)]
pub enum SimError {
    // ── Scheduling errors ─────────────────────────────────

    /// Attempted to schedule an event before the current simulated time.
    #[error("cannot schedule event at T={requested} when current time is T={current}")]
    InvalidSchedule { requested: u64, current: u64 },

    // ── Topology errors ───────────────────────────────────

    #[error("node {0} not found")]
    UnknownNode(NodeId),

    /// A SetUp/SetDown or address assignment named an interface the node
    /// does not have.
    #[error("node {node} has no interface {interface}")]
    UnknownInterface { node: NodeId, interface: IfIndex },

    #[error("link {0} not found")]
    UnknownLink(LinkId),

    /// Nodes and links cannot be added once the first event has fired.
    #[error("topology is frozen: nodes and links cannot change after simulation start")]
    TopologyFrozen,

    #[error("invalid link: {0}")]
    InvalidLink(String),

    #[error("interface metric must be at least 1")]
    InvalidMetric,

    /// A malformed address, subnet or prefix length, or a subnet with
    /// too few hosts for its link.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("address {0} is already assigned to another interface")]
    AddressConflict(Ipv4Addr),

    #[error("invalid data rate: {0}")]
    InvalidDataRate(String),

    // ── Log / replay errors ───────────────────────────────

    /// A line of an exported event log could not be parsed.
    #[error("event log line {line}: {reason}")]
    LogParse { line: usize, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serialize")]
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;

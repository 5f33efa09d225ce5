//! Per-node routing tables.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::topology::{IfIndex, NodeId};

/// Where a route came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum RouteOrigin {
    /// The node has an up interface on the destination network.
    Connected,
    /// Computed by the global shortest-path pass.
    Global,
}

/// One routing entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    pub destination: Ipv4Net,
    /// Next-hop address; `None` for directly connected networks.
    pub gateway: Option<Ipv4Addr>,
    pub interface: IfIndex,
    pub metric: u64,
    pub origin: RouteOrigin,
}

/// A node's routing table.
///
/// Connected routes are consulted before global ones, so a directly
/// attached network always wins over any computed path, whatever its
/// prefix length or cost.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RoutingTable {
    node: NodeId,
    connected: Vec<Route>,
    global: BTreeMap<Ipv4Net, Route>,
}

impl RoutingTable {
    /// An empty table for `node`.
    pub fn empty(node: NodeId) -> Self {
        RoutingTable {
            node,
            connected: Vec::new(),
            global: BTreeMap::new(),
        }
    }

    pub(crate) fn new(node: NodeId, connected: Vec<Route>, global: Vec<Route>) -> Self {
        RoutingTable {
            node,
            connected,
            global: global.into_iter().map(|r| (r.destination, r)).collect(),
        }
    }

    /// Same global section, fresh connected section.
    pub(crate) fn with_connected(&self, connected: Vec<Route>) -> Self {
        RoutingTable {
            node: self.node,
            connected,
            global: self.global.clone(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Find the route for `destination`.
    ///
    /// Longest-prefix match within connected routes first; global routes
    /// only when no connected network contains the destination.
    pub fn lookup(&self, destination: Ipv4Addr) -> Option<&Route> {
        longest_match(self.connected.iter(), destination)
            .or_else(|| longest_match(self.global.values(), destination))
    }

    /// All routes, connected first.
    pub fn routes(&self) -> impl Iterator<Item = &Route> + '_ {
        self.connected.iter().chain(self.global.values())
    }

    pub fn connected_routes(&self) -> &[Route] {
        &self.connected
    }

    pub fn global_routes(&self) -> impl Iterator<Item = &Route> + '_ {
        self.global.values()
    }

    pub fn len(&self) -> usize {
        self.connected.len() + self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connected.is_empty() && self.global.is_empty()
    }
}

fn longest_match<'a>(
    routes: impl Iterator<Item = &'a Route>,
    destination: Ipv4Addr,
) -> Option<&'a Route> {
    // Ties on prefix length keep the first candidate (lowest interface
    // for connected routes).
    routes
        .filter(|r| r.destination.contains(&destination))
        .fold(None, |best: Option<&Route>, r| match best {
            Some(b) if b.destination.prefix_len() >= r.destination.prefix_len() => Some(b),
            _ => Some(r),
        })
}

impl std::fmt::Display for RoutingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Node: {}", self.node)?;
        writeln!(
            f,
            "{:<16}{:<16}{:<16}{:<6}{:<7}{}",
            "Destination", "Gateway", "Genmask", "Flags", "Metric", "Iface"
        )?;
        for r in self.routes() {
            let gateway = r.gateway.unwrap_or(Ipv4Addr::UNSPECIFIED);
            let flags = if r.gateway.is_some() { "UG" } else { "U" };
            writeln!(
                f,
                "{:<16}{:<16}{:<16}{:<6}{:<7}{}",
                r.destination.network().to_string(),
                gateway.to_string(),
                r.destination.netmask().to_string(),
                flags,
                r.metric,
                r.interface.raw()
            )?;
        }
        Ok(())
    }
}

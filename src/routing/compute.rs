//! Global route computation.
//!
//! Every recompute runs Dijkstra from each node over the subgraph of
//! up, addressed interfaces and rebuilds all tables from scratch.
//! Equal-cost ties go to the lowest outgoing interface index, then the
//! lowest gateway address, so results never depend on map iteration
//! order.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::topology::{IfIndex, NodeId, Topology};

use super::table::{Route, RouteOrigin, RoutingTable};

/// The first hop of a shortest path, as seen from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FirstHop {
    interface: IfIndex,
    gateway: Ipv4Addr,
}

#[derive(Debug, Clone, Copy)]
struct Reach {
    cost: u64,
    first_hop: Option<FirstHop>,
}

/// Connected routes for `node`: one per up interface with an address,
/// in interface order.
pub fn connected_routes(topology: &Topology, node: NodeId) -> Vec<Route> {
    let Ok(n) = topology.node(node) else {
        return Vec::new();
    };
    n.interfaces()
        .iter()
        .filter(|i| i.is_up())
        .filter_map(|i| {
            i.network().map(|destination| Route {
                destination,
                gateway: None,
                interface: i.index(),
                metric: 0,
                origin: RouteOrigin::Connected,
            })
        })
        .collect()
}

/// Compute a fresh routing table for every node.
pub fn compute_tables(topology: &Topology) -> BTreeMap<NodeId, RoutingTable> {
    let attachments = network_attachments(topology);
    topology
        .nodes()
        .iter()
        .map(|node| {
            let src = node.id();
            let reach = shortest_paths(topology, src);
            let connected = connected_routes(topology, src);
            let global = global_routes(src, &reach, &attachments, &connected);
            (src, RoutingTable::new(src, connected, global))
        })
        .collect()
}

/// Every network with at least one up interface on it, and the nodes
/// attached through such an interface.
fn network_attachments(topology: &Topology) -> BTreeMap<Ipv4Net, Vec<NodeId>> {
    let mut map: BTreeMap<Ipv4Net, Vec<NodeId>> = BTreeMap::new();
    for node in topology.nodes() {
        for iface in node.interfaces().iter().filter(|i| i.is_up()) {
            if let Some(net) = iface.network() {
                let nodes = map.entry(net).or_default();
                if !nodes.contains(&node.id()) {
                    nodes.push(node.id());
                }
            }
        }
    }
    map
}

fn global_routes(
    src: NodeId,
    reach: &[Option<Reach>],
    attachments: &BTreeMap<Ipv4Net, Vec<NodeId>>,
    connected: &[Route],
) -> Vec<Route> {
    attachments
        .iter()
        .filter(|(net, _)| !connected.iter().any(|r| r.destination == **net))
        .filter_map(|(net, nodes)| {
            nodes
                .iter()
                .filter(|n| **n != src)
                .filter_map(|n| reach.get(n.index()).copied().flatten())
                .filter_map(|r| r.first_hop.map(|hop| (r.cost, hop)))
                .min()
                .map(|(cost, hop)| Route {
                    destination: *net,
                    gateway: Some(hop.gateway),
                    interface: hop.interface,
                    metric: cost,
                    origin: RouteOrigin::Global,
                })
        })
        .collect()
}

/// Single-source shortest paths from `src`, indexed by node.
fn shortest_paths(topology: &Topology, src: NodeId) -> Vec<Option<Reach>> {
    let n = topology.node_count();
    let mut reach: Vec<Option<Reach>> = vec![None; n];
    let mut settled = vec![false; n];
    let mut heap = BinaryHeap::new();

    reach[src.index()] = Some(Reach {
        cost: 0,
        first_hop: None,
    });
    heap.push(Reverse((0u64, src)));

    while let Some(Reverse((cost, u))) = heap.pop() {
        if settled[u.index()] {
            continue;
        }
        settled[u.index()] = true;
        let via = reach[u.index()].and_then(|r| r.first_hop);

        let Ok(node) = topology.node(u) else { continue };
        for iface in node.interfaces().iter().filter(|i| i.is_up() && i.address().is_some()) {
            let Ok(link) = topology.link(iface.link()) else { continue };
            for (v, j) in link.peers_of(u) {
                if settled[v.index()] {
                    continue;
                }
                let Ok(peer) = topology.interface(v, j) else { continue };
                let Some(gateway) = peer.ip().filter(|_| peer.is_up()) else {
                    continue;
                };
                let candidate = if u == src {
                    FirstHop {
                        interface: iface.index(),
                        gateway,
                    }
                } else {
                    match via {
                        Some(hop) => hop,
                        None => continue,
                    }
                };
                let next = cost + u64::from(iface.metric());
                match &mut reach[v.index()] {
                    Some(r) if next > r.cost => {}
                    Some(r) if next == r.cost => {
                        if r.first_hop.map_or(true, |h| candidate < h) {
                            r.first_hop = Some(candidate);
                        }
                    }
                    slot => {
                        *slot = Some(Reach {
                            cost: next,
                            first_hop: Some(candidate),
                        });
                        heap.push(Reverse((next, v)));
                    }
                }
            }
        }
    }
    reach
}

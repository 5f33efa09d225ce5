//! Network topology graph: nodes, interfaces, and links.
//!
//! The graph is built once before the simulation starts. After
//! [`Topology::freeze`] only interface status may change, and only
//! through the runtime's interface state machine.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`NodeId`], [`IfIndex`], [`LinkId`] newtypes |
//! | [`link`] | [`Link`], [`LinkKind`], [`LinkConfig`], [`DataRate`] |
//! | [`interface`] | [`Interface`], [`InterfaceStatus`] |

pub mod id;
pub mod interface;
pub mod link;

pub use id::{IfIndex, LinkId, NodeId};
pub use interface::{Interface, InterfaceStatus};
pub use link::{DataRate, Link, LinkConfig, LinkKind};

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use crate::error::{SimError, SimResult};

/// A simulated host or router and the interfaces it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) interfaces: Vec<Interface>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn interface(&self, index: IfIndex) -> Option<&Interface> {
        self.interfaces.get(index.index())
    }

    /// Whether `addr` is assigned to any of this node's interfaces.
    pub fn owns_address(&self, addr: Ipv4Addr) -> bool {
        self.interfaces.iter().any(|i| i.ip() == Some(addr))
    }
}

/// The topology graph. Owns every node and link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Topology {
    nodes: Vec<Node>,
    links: Vec<Link>,
    frozen: bool,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Construction ──────────────────────────────────────────────

    /// Add a node with no interfaces.
    pub fn add_node(&mut self) -> SimResult<NodeId> {
        self.ensure_mutable()?;
        let id = NodeId::new(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            interfaces: Vec::new(),
        });
        Ok(id)
    }

    /// Add `count` nodes and return their IDs in order.
    pub fn add_nodes(&mut self, count: usize) -> SimResult<Vec<NodeId>> {
        (0..count).map(|_| self.add_node()).collect()
    }

    /// Connect `nodes` with a new link. Each node gains one interface,
    /// numbered after its existing ones.
    pub fn add_link(&mut self, nodes: &[NodeId], config: LinkConfig) -> SimResult<LinkId> {
        self.ensure_mutable()?;
        for &n in nodes {
            self.node(n)?;
        }
        let distinct: BTreeSet<NodeId> = nodes.iter().copied().collect();
        if distinct.len() != nodes.len() {
            return Err(SimError::InvalidLink(
                "a node may attach to a link only once".into(),
            ));
        }
        match config.kind {
            LinkKind::PointToPoint if nodes.len() != 2 => {
                return Err(SimError::InvalidLink(format!(
                    "point-to-point link needs exactly 2 nodes, got {}",
                    nodes.len()
                )));
            }
            LinkKind::Shared if nodes.len() < 2 => {
                return Err(SimError::InvalidLink(format!(
                    "shared link needs at least 2 nodes, got {}",
                    nodes.len()
                )));
            }
            _ => {}
        }

        let link_id = LinkId::new(self.links.len() as u32);
        let mut endpoints = Vec::with_capacity(nodes.len());
        for &n in nodes {
            let node = &mut self.nodes[n.index()];
            let index = IfIndex::new(node.interfaces.len() as u32);
            node.interfaces.push(Interface::new(index, link_id));
            endpoints.push((n, index));
        }
        self.links.push(Link {
            id: link_id,
            config,
            endpoints,
        });
        Ok(link_id)
    }

    /// Assign `addr/prefix_len` to an interface.
    pub fn assign_address(
        &mut self,
        node: NodeId,
        interface: IfIndex,
        addr: Ipv4Addr,
        prefix_len: u8,
    ) -> SimResult<()> {
        self.ensure_mutable()?;
        let net = Ipv4Net::new(addr, prefix_len)
            .map_err(|e| SimError::InvalidAddress(format!("bad prefix length: {}", e)))?;
        if let Some((owner, idx)) = self.find_address_owner(addr) {
            if (owner, idx) != (node, interface) {
                return Err(SimError::AddressConflict(addr));
            }
        }
        self.interface_mut(node, interface)?.address = Some(net);
        Ok(())
    }

    /// Number every interface on `link` out of `subnet`, in attachment
    /// order, starting at the first host address.
    ///
    /// All-or-nothing: on error no interface has been touched.
    pub fn assign_subnet(&mut self, link: LinkId, subnet: Ipv4Net) -> SimResult<Vec<Ipv4Addr>> {
        self.ensure_mutable()?;
        let endpoints = self.link(link)?.endpoints.clone();
        let mut hosts = subnet.hosts();
        let mut planned = Vec::with_capacity(endpoints.len());
        for (node, iface) in endpoints {
            let addr = hosts.next().ok_or_else(|| {
                SimError::InvalidAddress(format!("subnet {} too small for link {}", subnet, link))
            })?;
            match self.find_address_owner(addr) {
                Some(owner) if owner != (node, iface) => return Err(SimError::AddressConflict(addr)),
                _ => {}
            }
            let net = Ipv4Net::new(addr, subnet.prefix_len())
                .map_err(|e| SimError::InvalidAddress(format!("bad prefix length: {}", e)))?;
            planned.push((node, iface, net));
        }

        for &(node, iface, net) in &planned {
            self.interface_mut(node, iface)?.address = Some(net);
        }
        Ok(planned.into_iter().map(|(_, _, net)| net.addr()).collect())
    }

    /// Set the routing cost of an interface.
    pub fn set_metric(&mut self, node: NodeId, interface: IfIndex, metric: u32) -> SimResult<()> {
        self.ensure_mutable()?;
        if metric == 0 {
            return Err(SimError::InvalidMetric);
        }
        self.interface_mut(node, interface)?.metric = metric;
        Ok(())
    }

    /// Forbid further structural changes.
    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    fn ensure_mutable(&self) -> SimResult<()> {
        if self.frozen {
            Err(SimError::TopologyFrozen)
        } else {
            Ok(())
        }
    }

    // ── Status ────────────────────────────────────────────────────

    /// Set an interface's status. Returns `true` when the status actually
    /// changed. Allowed after freezing.
    pub(crate) fn set_status(
        &mut self,
        node: NodeId,
        interface: IfIndex,
        status: InterfaceStatus,
    ) -> SimResult<bool> {
        let iface = self.interface_mut(node, interface)?;
        if iface.status == status {
            return Ok(false);
        }
        iface.status = status;
        Ok(true)
    }

    // ── Accessors ─────────────────────────────────────────────────

    pub fn node(&self, id: NodeId) -> SimResult<&Node> {
        self.nodes.get(id.index()).ok_or(SimError::UnknownNode(id))
    }

    pub fn interface(&self, node: NodeId, interface: IfIndex) -> SimResult<&Interface> {
        self.node(node)?
            .interface(interface)
            .ok_or(SimError::UnknownInterface { node, interface })
    }

    fn interface_mut(&mut self, node: NodeId, interface: IfIndex) -> SimResult<&mut Interface> {
        self.nodes
            .get_mut(node.index())
            .ok_or(SimError::UnknownNode(node))?
            .interfaces
            .get_mut(interface.index())
            .ok_or(SimError::UnknownInterface { node, interface })
    }

    pub fn link(&self, id: LinkId) -> SimResult<&Link> {
        self.links.get(id.index()).ok_or(SimError::UnknownLink(id))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The interface that carries `addr`, if any.
    pub fn find_address_owner(&self, addr: Ipv4Addr) -> Option<(NodeId, IfIndex)> {
        self.nodes.iter().find_map(|node| {
            node.interfaces
                .iter()
                .find(|i| i.ip() == Some(addr))
                .map(|i| (node.id, i.index))
        })
    }
}

#[cfg(test)]
mod tests;

//! Tests for topology construction and its invariants.

use std::net::Ipv4Addr;

use super::*;
use crate::error::SimError;

fn p2p() -> LinkConfig {
    LinkConfig::point_to_point(DataRate::mbps(5).unwrap(), 2_000_000)
}

#[test]
fn test_add_link_creates_one_interface_per_node() {
    let mut topo = Topology::new();
    let ids = topo.add_nodes(3).unwrap();

    let l0 = topo.add_link(&[ids[0], ids[1]], p2p()).unwrap();
    let l1 = topo.add_link(&[ids[1], ids[2]], p2p()).unwrap();

    assert_eq!(topo.node(ids[0]).unwrap().interfaces().len(), 1);
    assert_eq!(topo.node(ids[1]).unwrap().interfaces().len(), 2);

    // Interfaces are numbered per node in attachment order.
    let n1 = topo.node(ids[1]).unwrap();
    assert_eq!(n1.interfaces()[0].link(), l0);
    assert_eq!(n1.interfaces()[1].link(), l1);
    assert_eq!(n1.interfaces()[1].index(), IfIndex::new(1));

    let link = topo.link(l1).unwrap();
    assert_eq!(link.endpoints(), &[(ids[1], IfIndex::new(1)), (ids[2], IfIndex::new(0))]);
}

#[test]
fn test_every_interface_belongs_to_exactly_one_link() {
    let mut topo = Topology::new();
    let ids = topo.add_nodes(4).unwrap();
    topo.add_link(&[ids[0], ids[1]], p2p()).unwrap();
    topo.add_link(
        &[ids[1], ids[2], ids[3]],
        LinkConfig::shared(DataRate::mbps(5).unwrap(), 2_000_000),
    )
    .unwrap();

    for node in topo.nodes() {
        for iface in node.interfaces() {
            let attached: usize = topo
                .links()
                .iter()
                .filter(|l| l.endpoints().contains(&(node.id(), iface.index())))
                .count();
            assert_eq!(attached, 1, "{} {} attached {} times", node.id(), iface.index(), attached);
        }
    }
}

#[test]
fn test_point_to_point_needs_two_nodes() {
    let mut topo = Topology::new();
    let ids = topo.add_nodes(3).unwrap();
    assert!(matches!(
        topo.add_link(&ids, p2p()),
        Err(SimError::InvalidLink(_))
    ));
    assert!(matches!(
        topo.add_link(&[ids[0], ids[0]], p2p()),
        Err(SimError::InvalidLink(_))
    ));
}

#[test]
fn test_unknown_node_rejected() {
    let mut topo = Topology::new();
    let n0 = topo.add_node().unwrap();
    let err = topo.add_link(&[n0, NodeId::new(9)], p2p()).unwrap_err();
    assert!(matches!(err, SimError::UnknownNode(id) if id == NodeId::new(9)));
}

#[test]
fn test_assign_subnet_in_attachment_order() {
    let mut topo = Topology::new();
    let ids = topo.add_nodes(2).unwrap();
    let link = topo.add_link(&[ids[1], ids[0]], p2p()).unwrap();

    let addrs = topo
        .assign_subnet(link, "10.1.3.0/24".parse().unwrap())
        .unwrap();
    assert_eq!(addrs, vec![Ipv4Addr::new(10, 1, 3, 1), Ipv4Addr::new(10, 1, 3, 2)]);

    let iface = topo.interface(ids[0], IfIndex::new(0)).unwrap();
    assert_eq!(iface.ip(), Some(Ipv4Addr::new(10, 1, 3, 2)));
    assert_eq!(iface.network(), Some("10.1.3.0/24".parse().unwrap()));
    assert_eq!(topo.find_address_owner(Ipv4Addr::new(10, 1, 3, 1)), Some((ids[1], IfIndex::new(0))));
}

#[test]
fn test_address_conflict() {
    let mut topo = Topology::new();
    let ids = topo.add_nodes(2).unwrap();
    topo.add_link(&[ids[0], ids[1]], p2p()).unwrap();
    let addr = Ipv4Addr::new(10, 0, 0, 1);

    topo.assign_address(ids[0], IfIndex::new(0), addr, 24).unwrap();
    // Re-assigning to the same interface is fine.
    topo.assign_address(ids[0], IfIndex::new(0), addr, 24).unwrap();
    assert!(matches!(
        topo.assign_address(ids[1], IfIndex::new(0), addr, 24),
        Err(SimError::AddressConflict(a)) if a == addr
    ));
}

#[test]
fn test_subnet_conflict_leaves_link_unnumbered() {
    let mut topo = Topology::new();
    let ids = topo.add_nodes(3).unwrap();
    topo.add_link(&[ids[0], ids[1]], p2p()).unwrap();
    let link = topo.add_link(&[ids[1], ids[2]], p2p()).unwrap();
    topo.assign_address(ids[0], IfIndex::new(0), Ipv4Addr::new(10, 9, 0, 2), 24)
        .unwrap();

    // n1 would take .1, then n2's .2 collides with n0.
    let subnet: Ipv4Net = "10.9.0.0/24".parse().unwrap();
    assert!(matches!(
        topo.assign_subnet(link, subnet),
        Err(SimError::AddressConflict(a)) if a == Ipv4Addr::new(10, 9, 0, 2)
    ));
    assert_eq!(topo.node(ids[1]).unwrap().interfaces()[1].ip(), None);
    assert_eq!(topo.node(ids[2]).unwrap().interfaces()[0].ip(), None);
    assert_eq!(topo.find_address_owner(Ipv4Addr::new(10, 9, 0, 1)), None);
}

#[test]
fn test_subnet_too_small_leaves_link_unnumbered() {
    let mut topo = Topology::new();
    let ids = topo.add_nodes(2).unwrap();
    let link = topo.add_link(&[ids[0], ids[1]], p2p()).unwrap();

    let host: Ipv4Net = "10.0.0.7/32".parse().unwrap();
    assert!(matches!(
        topo.assign_subnet(link, host),
        Err(SimError::InvalidAddress(_))
    ));
    assert_eq!(topo.node(ids[0]).unwrap().interfaces()[0].ip(), None);

    let addrs = topo.assign_subnet(link, "10.0.0.0/30".parse().unwrap()).unwrap();
    assert_eq!(addrs, vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]);
}

#[test]
fn test_bad_prefix_length() {
    let mut topo = Topology::new();
    let ids = topo.add_nodes(2).unwrap();
    topo.add_link(&[ids[0], ids[1]], p2p()).unwrap();
    let err = topo
        .assign_address(ids[0], IfIndex::new(0), Ipv4Addr::new(10, 0, 0, 1), 33)
        .unwrap_err();
    assert!(matches!(err, SimError::InvalidAddress(_)));
}

#[test]
fn test_unknown_interface() {
    let mut topo = Topology::new();
    let n0 = topo.add_node().unwrap();
    let err = topo
        .assign_address(n0, IfIndex::new(3), Ipv4Addr::new(10, 0, 0, 1), 24)
        .unwrap_err();
    assert!(matches!(err, SimError::UnknownInterface { .. }));
}

#[test]
fn test_frozen_topology_rejects_structure_changes() {
    let mut topo = Topology::new();
    let ids = topo.add_nodes(2).unwrap();
    topo.add_link(&[ids[0], ids[1]], p2p()).unwrap();
    topo.freeze();

    assert!(matches!(topo.add_node(), Err(SimError::TopologyFrozen)));
    assert!(matches!(topo.add_link(&ids, p2p()), Err(SimError::TopologyFrozen)));
    assert!(matches!(
        topo.set_metric(ids[0], IfIndex::new(0), 5),
        Err(SimError::TopologyFrozen)
    ));

    // Status may still change.
    assert!(topo.set_status(ids[0], IfIndex::new(0), InterfaceStatus::Down).unwrap());
    assert!(!topo.set_status(ids[0], IfIndex::new(0), InterfaceStatus::Down).unwrap());
}

#[test]
fn test_zero_metric_rejected() {
    let mut topo = Topology::new();
    let ids = topo.add_nodes(2).unwrap();
    topo.add_link(&[ids[0], ids[1]], p2p()).unwrap();
    assert!(matches!(
        topo.set_metric(ids[0], IfIndex::new(0), 0),
        Err(SimError::InvalidMetric)
    ));
}

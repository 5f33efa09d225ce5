//! The seven-node dynamic routing scenario.
//!
//! ```text
//!        n0
//!         \ 5 Mb/s, 2 ms
//!          \          shared 5 Mb/s, 2 ms
//!           n2 -------------------------
//!          /        |    |    |
//!         /         n3   n4   n5
//!  5 Mb/s, 2 ms                 \ 1.5 Mb/s, 10 ms
//!       /                        \
//!      n1 ----------------------- n6
//!            5 Mb/s, 2 ms
//! ```
//!
//! n1 sends a constant 2 kb/s stream to n6's address on the n5-n6 link
//! from 1 s to 16 s, and an on/off stream to n6's address on the direct
//! n1-n6 link from 11 s to 16 s. The direct link is taken down and
//! brought back from both ends while traffic flows; with global routes
//! recomputed on every transition the streams fail over through n2.

use std::net::Ipv4Addr;

use crate::config::NetworkConfig;
use crate::dsl::{BuiltSimulation, SimulationBuilder};
use crate::error::SimResult;
use crate::time::VirtualTime;
use crate::topology::{DataRate, IfIndex, NodeId};
use crate::traffic::Flow;

/// n1's interface on the direct n1-n6 link.
pub const N1_DIRECT: (NodeId, IfIndex) = (NodeId::new(1), IfIndex::new(0));
/// n6's interface on the direct n1-n6 link.
pub const N6_DIRECT: (NodeId, IfIndex) = (NodeId::new(6), IfIndex::new(0));

/// Target of the constant flow: n6 on the n5-n6 link.
pub const FLOW1_DESTINATION: Ipv4Addr = Ipv4Addr::new(10, 1, 3, 2);
/// Target of the on/off flow: n6 on the direct link.
pub const FLOW2_DESTINATION: Ipv4Addr = Ipv4Addr::new(172, 16, 1, 2);

/// Time of the routing table dump.
pub const DUMP_AT: VirtualTime = VirtualTime::from_secs(12);

/// The topology alone, with no traffic or scheduled events.
///
/// Links are created in the order n0-n2, n1-n6, n1-n2, n5-n6, then the
/// shared segment, so every node's interface indices follow that order.
pub fn topology(config: NetworkConfig) -> SimulationBuilder {
    SimulationBuilder::new()
        .config(config)
        .nodes(7)
        .point_to_point(0, 2, "5Mbps", 2)
        .subnet("10.1.1.0/24")
        .point_to_point(1, 6, "5Mbps", 2)
        .subnet("172.16.1.0/24")
        .point_to_point(1, 2, "5Mbps", 2)
        .subnet("10.1.2.0/24")
        .point_to_point(5, 6, "1500kbps", 10)
        .subnet("10.1.3.0/24")
        .shared(&[2, 3, 4, 5], "5Mbps", 2)
        .subnet("10.250.1.0/24")
}

/// The full scenario: topology, both flows, interface events and the
/// routing table dump at 12 s.
pub fn reference(config: NetworkConfig) -> SimResult<BuiltSimulation> {
    let (n1, n1_if) = (N1_DIRECT.0.raw(), N1_DIRECT.1.raw());
    let (n6, n6_if) = (N6_DIRECT.0.raw(), N6_DIRECT.1.raw());
    let secs = VirtualTime::from_secs;
    let rate = DataRate::kbps(2)?;

    let flow1 = Flow::constant(NodeId::new(1), FLOW1_DESTINATION, rate, 50, secs(1), secs(16));
    let flow2 = Flow::constant(NodeId::new(1), FLOW2_DESTINATION, rate, 50, secs(11), secs(16))
        .on_off(secs(1).ticks(), secs(1).ticks());

    topology(config)
        .interface_down(n1, n1_if, secs(6))
        .interface_up(n1, n1_if, secs(4))
        .interface_down(n6, n6_if, secs(6))
        .interface_up(n6, n6_if, secs(8))
        .interface_down(n1, n1_if, secs(12))
        .interface_up(n1, n1_if, secs(14))
        .dump_routes(DUMP_AT)
        .flow(flow1)
        .flow(flow2)
        .build()
}

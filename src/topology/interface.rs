//! Interfaces: a node's attachment point to a link.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

use super::id::{IfIndex, LinkId};

/// Administrative status of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum InterfaceStatus {
    Up,
    Down,
}

impl std::fmt::Display for InterfaceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterfaceStatus::Up => write!(f, "up"),
            InterfaceStatus::Down => write!(f, "down"),
        }
    }
}

/// One interface of a node. Belongs to exactly one link.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Interface {
    pub(crate) index: IfIndex,
    pub(crate) link: LinkId,
    pub(crate) address: Option<Ipv4Net>,
    pub(crate) status: InterfaceStatus,
    /// Cost of sending through this interface; at least 1.
    pub(crate) metric: u32,
}

impl Interface {
    pub(crate) fn new(index: IfIndex, link: LinkId) -> Self {
        Interface {
            index,
            link,
            address: None,
            status: InterfaceStatus::Up,
            metric: 1,
        }
    }

    pub fn index(&self) -> IfIndex {
        self.index
    }

    pub fn link(&self) -> LinkId {
        self.link
    }

    /// Address and prefix, if one has been assigned.
    pub fn address(&self) -> Option<Ipv4Net> {
        self.address
    }

    /// Host part of the assigned address.
    pub fn ip(&self) -> Option<Ipv4Addr> {
        self.address.map(|net| net.addr())
    }

    /// The connected network (address with host bits cleared).
    pub fn network(&self) -> Option<Ipv4Net> {
        self.address.map(|net| net.trunc())
    }

    pub fn status(&self) -> InterfaceStatus {
        self.status
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.status == InterfaceStatus::Up
    }

    pub fn metric(&self) -> u32 {
        self.metric
    }
}

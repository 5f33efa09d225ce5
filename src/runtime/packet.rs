//! Packets carried through the forwarding engine.

use std::net::Ipv4Addr;

/// Default hop limit for new packets.
pub const DEFAULT_TTL: u8 = 64;

/// UDP + IPv4 header bytes added to every application payload.
pub const HEADER_OVERHEAD: u32 = 28;

/// Identifies a packet across its hops, for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct PacketId(u64);

impl PacketId {
    #[inline]
    pub fn new(raw: u64) -> Self {
        PacketId(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PacketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P#{}", self.0)
    }
}

/// Hands out strictly increasing packet IDs.
#[derive(Debug, Clone, Default)]
pub struct PacketIdGen {
    next: u64,
}

impl PacketIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> PacketId {
        let id = PacketId(self.next);
        self.next += 1;
        id
    }
}

/// A packet in flight.
///
/// `size` is the number of bytes on the wire and drives transmission
/// time; `payload` is opaque and never inspected by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Packet {
    pub id: PacketId,
    pub destination: Ipv4Addr,
    pub size: u32,
    pub ttl: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    /// A packet of `size` wire bytes with an empty payload.
    pub fn new(id: PacketId, destination: Ipv4Addr, size: u32) -> Self {
        Packet {
            id,
            destination,
            size,
            ttl: DEFAULT_TTL,
            payload: Vec::new(),
        }
    }

    /// A packet carrying `payload`, sized as payload plus UDP/IP headers.
    pub fn with_payload(id: PacketId, destination: Ipv4Addr, payload: Vec<u8>) -> Self {
        let size = u32::try_from(payload.len())
            .unwrap_or(u32::MAX)
            .saturating_add(HEADER_OVERHEAD);
        Packet {
            id,
            destination,
            size,
            ttl: DEFAULT_TTL,
            payload,
        }
    }
}

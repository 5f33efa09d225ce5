//! Links and their physical parameters.

use std::str::FromStr;

use crate::error::{SimError, SimResult};

use super::id::{IfIndex, LinkId, NodeId};

/// A transmission rate in bits per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DataRate(u64);

impl DataRate {
    /// Create a rate from bits per second. Zero is rejected.
    pub fn from_bps(bps: u64) -> SimResult<Self> {
        if bps == 0 {
            return Err(SimError::InvalidDataRate("rate must be non-zero".into()));
        }
        Ok(DataRate(bps))
    }

    pub fn kbps(k: u64) -> SimResult<Self> {
        Self::from_bps(k.saturating_mul(1_000))
    }

    pub fn mbps(m: u64) -> SimResult<Self> {
        Self::from_bps(m.saturating_mul(1_000_000))
    }

    #[inline]
    pub fn bps(self) -> u64 {
        self.0
    }

    /// Nanoseconds needed to clock `bytes` onto the wire, rounded up.
    pub fn transmission_time(self, bytes: u32) -> u64 {
        let bits = bytes as u128 * 8;
        let nanos = (bits * 1_000_000_000).div_ceil(self.0 as u128);
        u64::try_from(nanos).unwrap_or(u64::MAX)
    }
}

impl FromStr for DataRate {
    type Err = SimError;

    /// Parses `"5Mbps"`, `"1500kbps"`, `"1Gbps"` or `"800bps"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (digits, multiplier) = if let Some(v) = s.strip_suffix("Gbps") {
            (v, 1_000_000_000)
        } else if let Some(v) = s.strip_suffix("Mbps") {
            (v, 1_000_000)
        } else if let Some(v) = s.strip_suffix("kbps") {
            (v, 1_000)
        } else if let Some(v) = s.strip_suffix("bps") {
            (v, 1)
        } else {
            return Err(SimError::InvalidDataRate(s.to_string()));
        };
        let value: u64 = digits
            .trim()
            .parse()
            .map_err(|_| SimError::InvalidDataRate(s.to_string()))?;
        Self::from_bps(value.saturating_mul(multiplier))
    }
}

impl std::fmt::Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            b if b % 1_000_000_000 == 0 => write!(f, "{}Gbps", b / 1_000_000_000),
            b if b % 1_000_000 == 0 => write!(f, "{}Mbps", b / 1_000_000),
            b if b % 1_000 == 0 => write!(f, "{}kbps", b / 1_000),
            b => write!(f, "{}bps", b),
        }
    }
}

/// The medium a link models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkKind {
    /// Exactly two endpoints, full duplex.
    PointToPoint,
    /// Two or more endpoints sharing one half-duplex medium.
    Shared,
}

/// Physical parameters of a link, supplied to `Topology::add_link`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkConfig {
    pub kind: LinkKind,
    pub rate: DataRate,
    /// One-way propagation delay in ticks.
    pub delay: u64,
}

impl LinkConfig {
    pub fn point_to_point(rate: DataRate, delay: u64) -> Self {
        LinkConfig {
            kind: LinkKind::PointToPoint,
            rate,
            delay,
        }
    }

    pub fn shared(rate: DataRate, delay: u64) -> Self {
        LinkConfig {
            kind: LinkKind::Shared,
            rate,
            delay,
        }
    }
}

/// A medium connecting two or more interfaces. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Link {
    pub(crate) id: LinkId,
    pub(crate) config: LinkConfig,
    /// Attached interfaces, in attachment order.
    pub(crate) endpoints: Vec<(NodeId, IfIndex)>,
}

impl Link {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn kind(&self) -> LinkKind {
        self.config.kind
    }

    pub fn rate(&self) -> DataRate {
        self.config.rate
    }

    pub fn delay(&self) -> u64 {
        self.config.delay
    }

    pub fn endpoints(&self) -> &[(NodeId, IfIndex)] {
        &self.endpoints
    }

    /// Every endpoint except `node`'s own attachment.
    pub fn peers_of(&self, node: NodeId) -> impl Iterator<Item = (NodeId, IfIndex)> + '_ {
        self.endpoints.iter().copied().filter(move |(n, _)| *n != node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rates() {
        assert_eq!("5Mbps".parse::<DataRate>().unwrap().bps(), 5_000_000);
        assert_eq!("1500kbps".parse::<DataRate>().unwrap().bps(), 1_500_000);
        assert_eq!("2kbps".parse::<DataRate>().unwrap().bps(), 2_000);
        assert_eq!("1Gbps".parse::<DataRate>().unwrap().bps(), 1_000_000_000);
        assert_eq!("800bps".parse::<DataRate>().unwrap().bps(), 800);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("fast".parse::<DataRate>().is_err());
        assert!("Mbps".parse::<DataRate>().is_err());
        assert!("0kbps".parse::<DataRate>().is_err());
    }

    #[test]
    fn test_transmission_time() {
        let rate = DataRate::mbps(5).unwrap();
        // 78 bytes = 624 bits at 5 Mbps = 124.8 us, rounded up.
        assert_eq!(rate.transmission_time(78), 124_800);
        let slow = DataRate::from_bps(3).unwrap();
        assert_eq!(slow.transmission_time(1), 2_666_666_667);
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for s in ["5Mbps", "1500kbps", "1Gbps", "7bps"] {
            let rate: DataRate = s.parse().unwrap();
            assert_eq!(rate.to_string(), s);
        }
    }
}

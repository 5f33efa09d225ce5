/// Virtual time for the discrete-event simulation.
///
/// One tick is one simulated nanosecond. Time advances only when the
/// scheduler dispatches an event, never from wall-clock observation.

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

/// A point on the simulated timeline, in nanoseconds since start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The zero-point of simulation time.
    pub const ZERO: VirtualTime = VirtualTime(0);

    /// Create a new `VirtualTime` from a raw tick value.
    #[inline]
    pub const fn new(ticks: u64) -> Self {
        VirtualTime(ticks)
    }

    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        VirtualTime(secs.saturating_mul(NANOS_PER_SEC))
    }

    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        VirtualTime(millis.saturating_mul(NANOS_PER_MILLI))
    }

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        VirtualTime(micros.saturating_mul(NANOS_PER_MICRO))
    }

    /// Return the raw tick value.
    #[inline]
    pub const fn ticks(self) -> u64 {
        self.0
    }

    /// Time in (fractional) seconds, for display only.
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    /// `self + delta`, or `None` past the end of time.
    #[inline]
    pub fn checked_add(self, delta: u64) -> Option<VirtualTime> {
        self.0.checked_add(delta).map(VirtualTime)
    }

    /// `self + delta`, clamped at the end of time.
    #[inline]
    pub fn saturating_add(self, delta: u64) -> VirtualTime {
        VirtualTime(self.0.saturating_add(delta))
    }

    /// Returns `true` if `self` is strictly before `other`.
    #[inline]
    pub fn is_before(self, other: VirtualTime) -> bool {
        self.0 < other.0
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={:.6}s", self.as_secs_f64())
    }
}

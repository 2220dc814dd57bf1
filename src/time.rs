/// Virtual time for the simulation kernel.
///
/// A logical timestamp with no dependency on `std::time`. Time advances
/// only when the scheduler pops an occurrence.

/// A logical tick in simulation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VirtualTime(u64);

impl VirtualTime {
    /// The zero-point of simulation time.
    pub const ZERO: VirtualTime = VirtualTime(0);

    /// Create a new `VirtualTime` from a raw tick value.
    #[inline]
    pub fn new(ticks: u64) -> Self {
        VirtualTime(ticks)
    }

    /// Return the raw tick value.
    #[inline]
    pub fn ticks(self) -> u64 {
        self.0
    }

    /// The absolute time `delay` ticks after `self`, or `None` on overflow.
    #[inline]
    pub fn plus(self, delay: u64) -> Option<VirtualTime> {
        self.0.checked_add(delay).map(VirtualTime)
    }
}

impl From<u64> for VirtualTime {
    fn from(ticks: u64) -> Self {
        VirtualTime(ticks)
    }
}

impl std::fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "T={}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_default() {
        assert_eq!(VirtualTime::default(), VirtualTime::ZERO);
        assert_eq!(VirtualTime::ZERO.ticks(), 0);
    }

    #[test]
    fn test_plus() {
        assert_eq!(VirtualTime::new(100).plus(50), Some(VirtualTime::new(150)));
        assert!(VirtualTime::new(u64::MAX).plus(1).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(VirtualTime::new(42).to_string(), "T=42");
    }
}

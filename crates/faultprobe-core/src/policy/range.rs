use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive code-address range used by the stack filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddrRange {
    pub start: usize,
    pub end: usize,
}

impl AddrRange {
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Range covering exactly one address.
    pub const fn single(addr: usize) -> Self {
        Self { start: addr, end: addr }
    }

    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        self.start <= addr && addr <= self.end
    }

    /// True if any of `frames` falls inside the range.
    #[inline]
    pub fn hits(&self, frames: &[usize]) -> bool {
        frames.iter().any(|&a| self.contains(a))
    }
}

impl fmt::Display for AddrRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}..={:#x}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let r = AddrRange::new(0x10, 0x20);
        assert!(r.contains(0x10));
        assert!(r.contains(0x20));
        assert!(!r.contains(0x0f));
        assert!(!r.contains(0x21));
    }

    #[test]
    fn single_address() {
        let r = AddrRange::single(0xdead);
        assert!(r.hits(&[1, 2, 0xdead]));
        assert!(!r.hits(&[1, 2, 0xdeae]));
        assert!(!r.hits(&[]));
    }
}

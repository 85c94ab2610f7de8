//! Ready-made probe points for allocation paths.
//!
//! Each probe owns a [`PolicyState`](crate::PolicyState) plus a few
//! call-site filters, translates the request into a size and flags, and asks
//! an injector for a verdict. The caller then returns its own allocation
//! error instead of allocating.

mod page_alloc;
mod slab;

pub use page_alloc::{PageAllocProbe, PAGE_SIZE};
pub use slab::{SlabCache, SlabProbe};

/// Allocation request flags as seen by the probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocFlags(u32);

impl AllocFlags {
    pub const NONE: AllocFlags = AllocFlags(0);
    /// The caller cannot handle failure; never inject.
    pub const NOFAIL: AllocFlags = AllocFlags(1 << 0);
    /// The caller does not want allocation-failure warnings.
    pub const NOWARN: AllocFlags = AllocFlags(1 << 1);
    /// Request may be served from high memory.
    pub const HIGHMEM: AllocFlags = AllocFlags(1 << 2);
    /// Request may sleep to reclaim memory.
    pub const DIRECT_RECLAIM: AllocFlags = AllocFlags(1 << 3);

    pub const fn contains(self, other: AllocFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for AllocFlags {
    type Output = AllocFlags;

    fn bitor(self, rhs: AllocFlags) -> AllocFlags {
        AllocFlags(self.0 | rhs.0)
    }
}

impl AllocFlags {
    pub(crate) fn fault_flags(self) -> crate::FaultFlags {
        if self.contains(AllocFlags::NOWARN) {
            crate::FaultFlags::NOWARN
        } else {
            crate::FaultFlags::NONE
        }
    }
}

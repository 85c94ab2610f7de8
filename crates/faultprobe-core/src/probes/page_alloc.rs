use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use crate::engine::FaultInjector;
use crate::policy::PolicyState;

use super::AllocFlags;

pub const PAGE_SIZE: usize = 4096;

/// Probe for page-granular allocations of `PAGE_SIZE << order` bytes.
///
/// Defaults skip requests that may reclaim or use high memory and
/// single-page (order 0) requests.
#[derive(Debug)]
pub struct PageAllocProbe {
    pub policy: Arc<PolicyState>,
    ignore_gfp_highmem: AtomicBool,
    ignore_gfp_reclaim: AtomicBool,
    min_order: AtomicU32,
}

impl PageAllocProbe {
    pub fn new() -> Self {
        Self::with_policy(PolicyState::new("fail_page_alloc"))
    }

    pub fn with_policy(policy: impl Into<Arc<PolicyState>>) -> Self {
        Self {
            policy: policy.into(),
            ignore_gfp_highmem: AtomicBool::new(true),
            ignore_gfp_reclaim: AtomicBool::new(true),
            min_order: AtomicU32::new(1),
        }
    }

    pub fn ignore_gfp_highmem(&self) -> bool {
        self.ignore_gfp_highmem.load(Ordering::Relaxed)
    }
    pub fn set_ignore_gfp_highmem(&self, v: bool) {
        self.ignore_gfp_highmem.store(v, Ordering::Relaxed);
    }

    pub fn ignore_gfp_reclaim(&self) -> bool {
        self.ignore_gfp_reclaim.load(Ordering::Relaxed)
    }
    pub fn set_ignore_gfp_reclaim(&self, v: bool) {
        self.ignore_gfp_reclaim.store(v, Ordering::Relaxed);
    }

    pub fn min_order(&self) -> u32 {
        self.min_order.load(Ordering::Relaxed)
    }
    pub fn set_min_order(&self, order: u32) {
        self.min_order.store(order, Ordering::Relaxed);
    }

    /// Should an allocation of `2^order` pages with `flags` fail?
    pub fn should_fail<I: FaultInjector + ?Sized>(&self, injector: &I, flags: AllocFlags, order: u32) -> bool {
        if order < self.min_order() {
            return false;
        }
        if flags.contains(AllocFlags::NOFAIL) {
            return false;
        }
        if self.ignore_gfp_highmem() && flags.contains(AllocFlags::HIGHMEM) {
            return false;
        }
        if self.ignore_gfp_reclaim() && flags.contains(AllocFlags::DIRECT_RECLAIM) {
            return false;
        }

        injector.evaluate(&self.policy, request_size(order), flags.fault_flags())
    }
}

/// Bytes in a `2^order` page request, saturating at `isize::MAX`.
fn request_size(order: u32) -> isize {
    1usize
        .checked_shl(order)
        .and_then(|pages| PAGE_SIZE.checked_mul(pages))
        .and_then(|s| isize::try_from(s).ok())
        .unwrap_or(isize::MAX)
}

impl Default for PageAllocProbe {
    fn default() -> Self {
        Self::new()
    }
}

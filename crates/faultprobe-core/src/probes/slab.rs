use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::FaultInjector;
use crate::policy::PolicyState;

use super::AllocFlags;

/// Descriptor of an object cache, as far as the slab probe cares.
#[derive(Debug, Clone)]
pub struct SlabCache {
    pub name: String,
    pub object_size: usize,
    /// Opted in to failures when the probe runs with `cache_filter`.
    pub failslab: bool,
    /// The cache that allocates cache descriptors; never failed.
    pub bootstrap: bool,
}

impl SlabCache {
    pub fn new(name: impl Into<String>, object_size: usize) -> Self {
        Self {
            name: name.into(),
            object_size,
            failslab: false,
            bootstrap: false,
        }
    }

    pub fn with_failslab(mut self, enabled: bool) -> Self {
        self.failslab = enabled;
        self
    }
}

/// Probe for object-cache allocations.
#[derive(Debug)]
pub struct SlabProbe {
    pub policy: Arc<PolicyState>,
    ignore_gfp_reclaim: AtomicBool,
    cache_filter: AtomicBool,
}

impl SlabProbe {
    pub fn new() -> Self {
        Self::with_policy(PolicyState::new("failslab"))
    }

    pub fn with_policy(policy: impl Into<Arc<PolicyState>>) -> Self {
        Self {
            policy: policy.into(),
            ignore_gfp_reclaim: AtomicBool::new(true),
            cache_filter: AtomicBool::new(false),
        }
    }

    pub fn ignore_gfp_reclaim(&self) -> bool {
        self.ignore_gfp_reclaim.load(Ordering::Relaxed)
    }
    pub fn set_ignore_gfp_reclaim(&self, v: bool) {
        self.ignore_gfp_reclaim.store(v, Ordering::Relaxed);
    }

    /// When set, only caches marked `failslab` are eligible.
    pub fn cache_filter(&self) -> bool {
        self.cache_filter.load(Ordering::Relaxed)
    }
    pub fn set_cache_filter(&self, v: bool) {
        self.cache_filter.store(v, Ordering::Relaxed);
    }

    pub fn should_fail<I: FaultInjector + ?Sized>(&self, injector: &I, cache: &SlabCache, flags: AllocFlags) -> bool {
        if cache.bootstrap {
            return false;
        }
        if flags.contains(AllocFlags::NOFAIL) {
            return false;
        }
        if self.ignore_gfp_reclaim() && flags.contains(AllocFlags::DIRECT_RECLAIM) {
            return false;
        }
        if self.cache_filter() && !cache.failslab {
            return false;
        }

        let size = isize::try_from(cache.object_size).unwrap_or(isize::MAX);
        injector.evaluate(&self.policy, size, flags.fault_flags())
    }
}

impl Default for SlabProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DecisionEngine;
    use crate::policy::{PolicyConfig, UNLIMITED};

    fn probe() -> SlabProbe {
        let p = SlabProbe::new();
        p.policy.apply(&PolicyConfig { times: UNLIMITED, verbose: 0, ..PolicyConfig::default() }).unwrap();
        p
    }

    #[test]
    fn bootstrap_cache_is_exempt() {
        let p = probe();
        let mut cache = SlabCache::new("kmem_cache", 256);
        cache.bootstrap = true;
        assert!(!p.should_fail(&DecisionEngine::new(), &cache, AllocFlags::NONE));
    }

    #[test]
    fn cache_filter_requires_opt_in() {
        let p = probe();
        p.set_cache_filter(true);
        let e = DecisionEngine::new();
        assert!(!p.should_fail(&e, &SlabCache::new("dentry", 192), AllocFlags::NONE));
        assert!(p.should_fail(&e, &SlabCache::new("dentry", 192).with_failslab(true), AllocFlags::NONE));
    }

    #[test]
    fn reclaiming_requests_skipped_by_default() {
        let p = probe();
        let e = DecisionEngine::new();
        let cache = SlabCache::new("inode", 600);
        assert!(!p.should_fail(&e, &cache, AllocFlags::DIRECT_RECLAIM));
        p.set_ignore_gfp_reclaim(false);
        assert!(p.should_fail(&e, &cache, AllocFlags::DIRECT_RECLAIM));
    }

    #[test]
    fn nowarn_still_fails() {
        let p = probe();
        p.policy.set_verbose(2);
        let cache = SlabCache::new("buf", 64);
        assert!(p.should_fail(&DecisionEngine::new(), &cache, AllocFlags::NOWARN));
        assert_eq!(p.policy.injected(), 1);
    }
}

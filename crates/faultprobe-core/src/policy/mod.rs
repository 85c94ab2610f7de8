//! Policy state for one probe point.
//!
//! Every field is an independent atomic: evaluation and reconfiguration only
//! need `&PolicyState`, so a probe point is typically a `static` or an
//! `Arc<PolicyState>` shared by all call sites and the control surface.
//! There is no cross-field snapshot isolation; a concurrent reconfiguration
//! may be observed half-applied by an evaluation in flight.

mod config;
mod range;

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

pub use config::PolicyConfig;
pub(crate) use config::{
    validate_interval, validate_probability, validate_space, validate_stacktrace_depth,
};
pub use range::AddrRange;

use crate::error::Result;
use crate::ratelimit::RateLimiter;
use crate::sample::Sampler;

/// `times` value meaning "no budget limit". Any negative value is treated the
/// same way.
pub const UNLIMITED: i64 = -1;

/// Capacity of the on-stack frame buffer used by the stack filter.
pub const MAX_STACK_DEPTH: usize = 32;

const REQUIRE_UNSET: (usize, usize) = (0, usize::MAX);
const REJECT_UNSET: (usize, usize) = (0, 0);

/// Verbosity levels for injection reports.
pub mod verbose {
    pub const SILENT: u32 = 0;
    pub const SUMMARY: u32 = 1;
    pub const STACK: u32 = 2;
}

#[derive(Debug)]
pub struct PolicyState {
    name: String,

    probability: AtomicU32,
    interval: AtomicU64,
    times: AtomicI64,
    space: AtomicI64,
    countdown: AtomicU64,

    verbose: AtomicU32,
    task_filter: AtomicBool,
    stacktrace_depth: AtomicUsize,
    require_start: AtomicUsize,
    require_end: AtomicUsize,
    reject_start: AtomicUsize,
    reject_end: AtomicUsize,

    ratelimit: RateLimiter,
    sampler: Sampler,

    attempts: AtomicU64,
    injected: AtomicU64,
}

impl Default for PolicyState {
    fn default() -> Self {
        Self::new("")
    }
}

impl PolicyState {
    /// Single-shot default: fail the first call that reaches this point,
    /// then never again.
    pub fn new(name: impl Into<String>) -> Self {
        let d = PolicyConfig::default();
        Self {
            name: name.into(),
            probability: AtomicU32::new(d.probability),
            interval: AtomicU64::new(d.interval),
            times: AtomicI64::new(d.times),
            space: AtomicI64::new(d.space),
            countdown: AtomicU64::new(0),
            verbose: AtomicU32::new(d.verbose),
            task_filter: AtomicBool::new(d.task_filter),
            stacktrace_depth: AtomicUsize::new(d.stacktrace_depth),
            require_start: AtomicUsize::new(REQUIRE_UNSET.0),
            require_end: AtomicUsize::new(REQUIRE_UNSET.1),
            reject_start: AtomicUsize::new(REJECT_UNSET.0),
            reject_end: AtomicUsize::new(REJECT_UNSET.1),
            ratelimit: RateLimiter::disabled(),
            sampler: Sampler::new(),
            attempts: AtomicU64::new(0),
            injected: AtomicU64::new(0),
        }
    }

    pub fn from_config(name: impl Into<String>, cfg: &PolicyConfig) -> Result<Self> {
        let state = Self::new(name);
        state.apply(cfg)?;
        Ok(state)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // ── tunables ────────────────────────────────────────────────

    pub fn probability(&self) -> u32 {
        self.probability.load(Ordering::Relaxed)
    }

    pub fn set_probability(&self, p: u32) -> Result<()> {
        validate_probability(p)?;
        self.probability.store(p, Ordering::Relaxed);
        Ok(())
    }

    /// Sampling period, never less than 1.
    pub fn interval(&self) -> u64 {
        self.interval.load(Ordering::Relaxed).max(1)
    }

    /// Takes effect at the next sampling boundary.
    pub fn set_interval(&self, interval: u64) -> Result<()> {
        validate_interval(interval)?;
        self.interval.store(interval, Ordering::Relaxed);
        Ok(())
    }

    pub fn times(&self) -> i64 {
        self.times.load(Ordering::Relaxed)
    }

    pub fn set_times(&self, times: i64) {
        self.times.store(times, Ordering::Relaxed);
    }

    pub fn is_unlimited(&self) -> bool {
        self.times() < 0
    }

    pub fn space(&self) -> i64 {
        self.space.load(Ordering::Relaxed)
    }

    pub fn set_space(&self, space: i64) -> Result<()> {
        validate_space(space)?;
        self.space.store(space, Ordering::Relaxed);
        Ok(())
    }

    pub fn verbose(&self) -> u32 {
        self.verbose.load(Ordering::Relaxed)
    }

    pub fn set_verbose(&self, level: u32) {
        self.verbose.store(level, Ordering::Relaxed);
    }

    pub fn task_filter(&self) -> bool {
        self.task_filter.load(Ordering::Relaxed)
    }

    pub fn set_task_filter(&self, enabled: bool) {
        self.task_filter.store(enabled, Ordering::Relaxed);
    }

    pub fn stacktrace_depth(&self) -> usize {
        self.stacktrace_depth.load(Ordering::Relaxed)
    }

    /// At most [`MAX_STACK_DEPTH`]; `0` disables the stack filter.
    pub fn set_stacktrace_depth(&self, depth: usize) -> Result<()> {
        validate_stacktrace_depth(depth)?;
        self.stacktrace_depth.store(depth, Ordering::Relaxed);
        Ok(())
    }

    pub fn require_start(&self) -> usize {
        self.require_start.load(Ordering::Relaxed)
    }
    pub fn require_end(&self) -> usize {
        self.require_end.load(Ordering::Relaxed)
    }
    pub fn reject_start(&self) -> usize {
        self.reject_start.load(Ordering::Relaxed)
    }
    pub fn reject_end(&self) -> usize {
        self.reject_end.load(Ordering::Relaxed)
    }

    pub fn set_require_start(&self, addr: usize) {
        self.require_start.store(addr, Ordering::Relaxed);
    }
    pub fn set_require_end(&self, addr: usize) {
        self.require_end.store(addr, Ordering::Relaxed);
    }
    pub fn set_reject_start(&self, addr: usize) {
        self.reject_start.store(addr, Ordering::Relaxed);
    }
    pub fn set_reject_end(&self, addr: usize) {
        self.reject_end.store(addr, Ordering::Relaxed);
    }

    /// `None` when unset (`0..=usize::MAX`).
    pub fn require_range(&self) -> Option<AddrRange> {
        let r = (self.require_start(), self.require_end());
        (r != REQUIRE_UNSET).then(|| AddrRange::new(r.0, r.1))
    }

    /// `None` when unset (`0..=0`).
    pub fn reject_range(&self) -> Option<AddrRange> {
        let r = (self.reject_start(), self.reject_end());
        (r != REJECT_UNSET).then(|| AddrRange::new(r.0, r.1))
    }

    pub fn set_require_range(&self, range: Option<AddrRange>) {
        let (start, end) = range.map_or(REQUIRE_UNSET, |r| (r.start, r.end));
        self.set_require_start(start);
        self.set_require_end(end);
    }

    pub fn set_reject_range(&self, range: Option<AddrRange>) {
        let (start, end) = range.map_or(REJECT_UNSET, |r| (r.start, r.end));
        self.set_reject_start(start);
        self.set_reject_end(end);
    }

    pub fn ratelimit(&self) -> &RateLimiter {
        &self.ratelimit
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    // ── counters ────────────────────────────────────────────────

    /// Evaluations that got past the probability-zero fast path.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Evaluations that returned `true`.
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    /// Calls left until the next sampling instant.
    pub fn countdown(&self) -> u64 {
        self.countdown.load(Ordering::Relaxed)
    }

    /// Position the throttle; values above the interval are clamped.
    pub fn set_countdown(&self, n: u64) {
        self.countdown.store(n.min(self.interval()), Ordering::Relaxed);
    }

    // ── bulk views ──────────────────────────────────────────────

    pub fn snapshot(&self) -> PolicyConfig {
        PolicyConfig {
            probability: self.probability(),
            interval: self.interval(),
            times: self.times(),
            space: self.space(),
            verbose: self.verbose(),
            task_filter: self.task_filter(),
            stacktrace_depth: self.stacktrace_depth(),
            require: self.require_range(),
            reject: self.reject_range(),
            ratelimit_interval_ms: u64::try_from(self.ratelimit.interval().as_millis())
                .unwrap_or(u64::MAX),
            ratelimit_burst: self.ratelimit.burst(),
            seed: self.sampler.seed(),
        }
    }

    /// Replace every tunable. The config is validated up front, so an
    /// invalid one leaves the state untouched. Counters are not reset.
    pub fn apply(&self, cfg: &PolicyConfig) -> Result<()> {
        cfg.validate()?;

        self.probability.store(cfg.probability, Ordering::Relaxed);
        self.interval.store(cfg.interval, Ordering::Relaxed);
        self.times.store(cfg.times, Ordering::Relaxed);
        self.space.store(cfg.space, Ordering::Relaxed);
        self.set_verbose(cfg.verbose);
        self.set_task_filter(cfg.task_filter);
        self.stacktrace_depth
            .store(cfg.stacktrace_depth, Ordering::Relaxed);
        self.set_require_range(cfg.require);
        self.set_reject_range(cfg.reject);
        self.ratelimit
            .set_interval(Duration::from_millis(cfg.ratelimit_interval_ms));
        self.ratelimit.set_burst(cfg.ratelimit_burst);
        if self.sampler.seed() != cfg.seed {
            self.sampler.set_seed(cfg.seed);
        }
        Ok(())
    }

    // ── decision-path primitives ────────────────────────────────

    /// Counts an attempt and returns the new total.
    pub(crate) fn record_attempt(&self) -> u64 {
        self.attempts.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }

    pub(crate) fn record_injection(&self) {
        self.injected.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether either address range is configured.
    pub(crate) fn stack_filter_active(&self) -> bool {
        self.require_range().is_some() || self.reject_range().is_some()
    }

    /// Size-skip gate. Returns `true` if the request was absorbed by the
    /// remaining `space` and must not fail.
    pub(crate) fn absorb_size(&self, size: isize) -> bool {
        if size <= 0 {
            return false;
        }
        let size = i64::try_from(size).unwrap_or(i64::MAX);
        self.space
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |s| {
                (s > size).then(|| s - size)
            })
            .is_ok()
    }

    /// Throttle step. Returns `true` on a sampling instant, at which point
    /// the countdown restarts from the current interval. A countdown left
    /// over from a larger interval is clamped to the current one first.
    pub(crate) fn tick(&self) -> bool {
        let interval = self.interval();
        match self
            .countdown
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
                let c = c.min(interval);
                Some(if c <= 1 { interval } else { c - 1 })
            }) {
            Ok(prev) | Err(prev) => prev.min(interval) <= 1,
        }
    }

    /// Take one unit of budget. Never drives a limited budget below zero.
    pub(crate) fn consume_budget(&self) -> bool {
        match self
            .times
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| {
                (t > 0).then(|| t - 1)
            }) {
            Ok(_) => true,
            Err(t) => t < 0,
        }
    }

    pub(crate) fn budget_exhausted(&self) -> bool {
        self.times() == 0
    }
}

//! The decision engine.
//!
//! [`DecisionEngine::evaluate`] answers "should this invocation fail?" for a
//! [`PolicyState`]. Filters run cheapest first, the throttle runs before the
//! random draw so unsampled calls consume neither entropy nor budget, and the
//! budget is charged only after a sample wins.
//!
//! The path is allocation-free and lock-free; it is safe to call from any
//! thread at any rate.

use crate::context::{ExecutionContext, ThreadContext};
use crate::policy::{verbose, PolicyState, MAX_STACK_DEPTH};
use crate::report::FaultReport;

/// Per-call evaluation flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FaultFlags(u32);

impl FaultFlags {
    pub const NONE: FaultFlags = FaultFlags(0);
    /// Suppress the injection report for this call only.
    pub const NOWARN: FaultFlags = FaultFlags(1 << 0);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: FaultFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for FaultFlags {
    type Output = FaultFlags;

    fn bitor(self, rhs: FaultFlags) -> FaultFlags {
        FaultFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for FaultFlags {
    fn bitor_assign(&mut self, rhs: FaultFlags) {
        self.0 |= rhs.0;
    }
}

/// Probe-point API. `size <= 0` means the request has no meaningful size.
pub trait FaultInjector: Send + Sync {
    fn evaluate(&self, policy: &PolicyState, size: isize, flags: FaultFlags) -> bool;

    fn should_fail(&self, policy: &PolicyState, size: isize) -> bool {
        self.evaluate(policy, size, FaultFlags::NONE)
    }
}

/// Injector for builds where fault injection is compiled out or disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEngine;

impl FaultInjector for NoopEngine {
    #[inline]
    fn evaluate(&self, _policy: &PolicyState, _size: isize, _flags: FaultFlags) -> bool {
        false
    }
}

enum Nth {
    Disarmed,
    Pending,
    /// Fire now; carries the number of frames captured into the buffer.
    Fire(usize),
}

#[derive(Debug, Clone, Default)]
pub struct DecisionEngine<C = ThreadContext> {
    ctx: C,
}

impl DecisionEngine<ThreadContext> {
    pub const fn new() -> Self {
        Self { ctx: ThreadContext::new() }
    }
}

impl<C: ExecutionContext> DecisionEngine<C> {
    pub fn with_context(ctx: C) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &C {
        &self.ctx
    }

    /// Capture frames when the stack filter is configured. Returns `None` if
    /// the filter rejects the call.
    fn stack_filter<'b>(
        &self,
        policy: &PolicyState,
        buf: &'b mut [usize; MAX_STACK_DEPTH],
    ) -> Option<&'b [usize]> {
        let depth = policy.stacktrace_depth().min(MAX_STACK_DEPTH);
        if depth == 0 || !policy.stack_filter_active() {
            return Some(&buf[..0]);
        }

        let n = self.ctx.capture_stack(&mut buf[..depth]).min(depth);
        let frames = &buf[..n];

        if let Some(reject) = policy.reject_range() {
            if reject.hits(frames) {
                return None;
            }
        }
        if let Some(require) = policy.require_range() {
            if !require.hits(frames) {
                return None;
            }
        }
        Some(frames)
    }

    /// Per-task "fail my Nth call" override.
    fn fail_nth(&self, policy: &PolicyState, buf: &mut [usize; MAX_STACK_DEPTH]) -> Nth {
        if !self.ctx.in_task() {
            return Nth::Disarmed;
        }
        let nth = self.ctx.fail_nth();
        if nth == 0 {
            return Nth::Disarmed;
        }
        // Calls outside the configured stack ranges do not count down.
        let Some(frames) = self.stack_filter(policy, buf) else {
            return Nth::Pending;
        };
        let n = frames.len();
        self.ctx.store_fail_nth(nth - 1);
        if nth == 1 {
            Nth::Fire(n)
        } else {
            Nth::Pending
        }
    }

    fn inject(&self, policy: &PolicyState, attempt: u64, flags: FaultFlags, frames: &[usize]) -> bool {
        if !flags.contains(FaultFlags::NOWARN)
            && policy.verbose() > 0
            && policy.ratelimit().allow()
        {
            let mut extra = [0usize; MAX_STACK_DEPTH];
            let frames = if frames.is_empty() && policy.verbose() >= verbose::STACK {
                // Nothing was captured for filtering; capture for the report.
                let depth = policy.stacktrace_depth().min(MAX_STACK_DEPTH);
                let n = self.ctx.capture_stack(&mut extra[..depth]).min(depth);
                &extra[..n]
            } else {
                frames
            };
            FaultReport::new(policy, attempt, frames).emit();
        }
        policy.record_injection();
        true
    }
}

impl<C: ExecutionContext> FaultInjector for DecisionEngine<C> {
    fn evaluate(&self, policy: &PolicyState, size: isize, flags: FaultFlags) -> bool {
        let mut buf = [0usize; MAX_STACK_DEPTH];

        match self.fail_nth(policy, &mut buf) {
            Nth::Disarmed => {}
            Nth::Pending => return false,
            Nth::Fire(n) => {
                let attempt = policy.record_attempt();
                // The override bypasses the budget gate but still charges it.
                let _ = policy.consume_budget();
                return self.inject(policy, attempt, flags, &buf[..n]);
            }
        }

        let probability = policy.probability();
        if probability == 0 {
            return false;
        }
        let attempt = policy.record_attempt();

        if policy.task_filter() && !(self.ctx.in_task() && self.ctx.may_fail()) {
            return false;
        }

        if policy.budget_exhausted() {
            return false;
        }

        let n = match self.stack_filter(policy, &mut buf) {
            Some(frames) => frames.len(),
            None => return false,
        };

        if policy.absorb_size(size) {
            return false;
        }

        if !policy.tick() {
            return false;
        }

        if probability < 100 && policy.sampler().percent() >= probability {
            return false;
        }

        if !policy.consume_budget() {
            return false;
        }

        self.inject(policy, attempt, flags, &buf[..n])
    }
}

static THREAD_ENGINE: DecisionEngine<ThreadContext> = DecisionEngine::new();

/// Evaluate `policy` against the calling thread's context.
pub fn should_fail_ex(policy: &PolicyState, size: isize, flags: FaultFlags) -> bool {
    THREAD_ENGINE.evaluate(policy, size, flags)
}

/// [`should_fail_ex`] with no flags.
pub fn should_fail(policy: &PolicyState, size: isize) -> bool {
    THREAD_ENGINE.should_fail(policy, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{AddrRange, PolicyConfig, UNLIMITED};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Deterministic context for exercising the filters.
    struct FixedContext {
        may_fail: bool,
        in_task: bool,
        frames: Vec<usize>,
    }

    impl ExecutionContext for FixedContext {
        fn in_task(&self) -> bool {
            self.in_task
        }
        fn may_fail(&self) -> bool {
            self.may_fail
        }
        fn fail_nth(&self) -> u32 {
            0
        }
        fn store_fail_nth(&self, _n: u32) {}
        fn capture_stack(&self, out: &mut [usize]) -> usize {
            let n = out.len().min(self.frames.len());
            out[..n].copy_from_slice(&self.frames[..n]);
            n
        }
    }

    fn engine(frames: &[usize]) -> DecisionEngine<FixedContext> {
        DecisionEngine::with_context(FixedContext {
            may_fail: false,
            in_task: true,
            frames: frames.to_vec(),
        })
    }

    fn always() -> PolicyState {
        let p = PolicyState::from_config("t", &PolicyConfig::always()).unwrap();
        p.set_verbose(0);
        p
    }

    #[test]
    fn default_policy_fails_once() {
        let e = engine(&[]);
        let p = PolicyState::new("t");
        p.set_verbose(0);
        assert!(e.should_fail(&p, 0));
        assert!(!e.should_fail(&p, 0));
        assert_eq!(p.times(), 0);
    }

    #[test]
    fn noop_never_fails() {
        let p = always();
        assert!((0..100).all(|_| !NoopEngine.should_fail(&p, 1)));
        assert_eq!(p.attempts(), 0);
    }

    #[test]
    fn reject_range_wins_over_require() {
        let e = engine(&[0x10, 0x20]);
        let p = always();
        p.set_require_range(Some(AddrRange::single(0x10)));
        p.set_reject_range(Some(AddrRange::single(0x20)));
        assert!(!e.should_fail(&p, 0));
    }

    #[test]
    fn depth_limits_the_frames_considered() {
        let e = engine(&[0x1, 0x2, 0x3]);
        let p = always();
        p.set_require_range(Some(AddrRange::single(0x3)));
        p.set_stacktrace_depth(2).unwrap();
        assert!(!e.should_fail(&p, 0));
        p.set_stacktrace_depth(3).unwrap();
        assert!(e.should_fail(&p, 0));
    }

    #[test]
    fn zero_depth_disables_stack_filter() {
        let e = engine(&[0x1]);
        let p = always();
        p.set_require_range(Some(AddrRange::single(0x99)));
        p.set_stacktrace_depth(0).unwrap();
        assert!(e.should_fail(&p, 0));
    }

    #[test]
    fn task_filter_needs_task_context() {
        let e = DecisionEngine::with_context(FixedContext {
            may_fail: true,
            in_task: false,
            frames: vec![],
        });
        let p = always();
        p.set_task_filter(true);
        assert!(!e.should_fail(&p, 0));
    }

    #[test]
    fn sized_requests_drain_space_first() {
        let e = engine(&[]);
        let p = always();
        p.set_space(4096).unwrap();
        assert!(!e.should_fail(&p, 1024));
        assert!(!e.should_fail(&p, 1024));
        assert!(!e.should_fail(&p, 1024));
        assert_eq!(p.space(), 1024);
        assert!(e.should_fail(&p, 1024));
        // Unsized requests are not subject to the space budget.
        p.set_space(4096).unwrap();
        assert!(e.should_fail(&p, 0));
    }

    #[test]
    fn flags_compose() {
        let mut f = FaultFlags::NONE;
        assert!(!f.contains(FaultFlags::NOWARN));
        f |= FaultFlags::NOWARN;
        assert!(f.contains(FaultFlags::NOWARN));
        assert_eq!((FaultFlags::NONE | FaultFlags::NOWARN).bits(), 1);
    }

    #[test]
    fn injections_are_counted() {
        let e = engine(&[]);
        let p = always();
        p.set_times(UNLIMITED);
        for _ in 0..5 {
            assert!(e.evaluate(&p, 0, FaultFlags::NOWARN));
        }
        assert_eq!(p.injected(), 5);
        assert_eq!(p.attempts(), 5);
    }

    struct NthContext {
        nth: AtomicU32,
    }

    impl ExecutionContext for NthContext {
        fn may_fail(&self) -> bool {
            false
        }
        fn fail_nth(&self) -> u32 {
            self.nth.load(Ordering::Relaxed)
        }
        fn store_fail_nth(&self, n: u32) {
            self.nth.store(n, Ordering::Relaxed);
        }
        fn capture_stack(&self, _out: &mut [usize]) -> usize {
            0
        }
    }

    #[test]
    fn fail_nth_overrides_probability() {
        let e = DecisionEngine::with_context(NthContext { nth: AtomicU32::new(3) });
        let p = PolicyState::new("t");
        p.set_probability(0).unwrap();
        p.set_verbose(0);
        let verdicts: Vec<bool> = (0..5).map(|_| e.should_fail(&p, 0)).collect();
        assert_eq!(verdicts, [false, false, true, false, false]);
        assert_eq!(e.context().fail_nth(), 0);
    }
}

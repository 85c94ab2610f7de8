//! Ambient execution context consulted by the decision engine.
//!
//! The engine needs three things from its host: whether the current task has
//! opted in to failures, whether that task armed a per-task "fail the Nth
//! call" counter, and the addresses of its callers. [`ExecutionContext`]
//! abstracts those so tests and embedders can supply their own.
//!
//! [`ThreadContext`] is the default: every OS thread is a task, and the call
//! stack is a shadow stack maintained by instrumented code through
//! [`ThreadContext::enter_frame`].

use std::cell::{Cell, RefCell};

/// Host services the engine treats as opaque.
pub trait ExecutionContext: Send + Sync {
    /// Whether the caller runs in task context (as opposed to an
    /// interrupt-like context that has no task identity).
    fn in_task(&self) -> bool {
        true
    }

    /// Whether the current task was explicitly marked eligible for failures.
    fn may_fail(&self) -> bool;

    /// Current value of the per-task fail-nth counter (0 = disarmed).
    fn fail_nth(&self) -> u32;

    /// Store a new per-task fail-nth value.
    fn store_fail_nth(&self, n: u32);

    /// Copy up to `out.len()` caller addresses, innermost first.
    /// Returns the number of entries written. Must not allocate.
    fn capture_stack(&self, out: &mut [usize]) -> usize;
}

thread_local! {
    static MAKE_IT_FAIL: Cell<bool> = const { Cell::new(false) };
    static FAIL_NTH: Cell<u32> = const { Cell::new(0) };
    static SHADOW_STACK: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Thread-local execution context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadContext;

impl ThreadContext {
    pub const fn new() -> Self {
        ThreadContext
    }

    /// Mark (or unmark) the current thread as eligible for task-filtered probes.
    pub fn set_may_fail(enabled: bool) {
        let _ = MAKE_IT_FAIL.try_with(|c| c.set(enabled));
    }

    /// Arm the current thread to fail its `n`th evaluation from now.
    /// `0` disarms.
    pub fn set_fail_nth(n: u32) {
        let _ = FAIL_NTH.try_with(|c| c.set(n));
    }

    /// Remaining fail-nth count for the current thread.
    pub fn current_fail_nth() -> u32 {
        FAIL_NTH.try_with(Cell::get).unwrap_or(0)
    }

    /// Push `addr` on the current thread's shadow stack until the guard drops.
    pub fn enter_frame(addr: usize) -> FrameGuard {
        let _ = SHADOW_STACK.try_with(|s| {
            if let Ok(mut s) = s.try_borrow_mut() {
                s.push(addr);
            }
        });
        FrameGuard { _private: () }
    }
}

impl ExecutionContext for ThreadContext {
    fn may_fail(&self) -> bool {
        MAKE_IT_FAIL.try_with(Cell::get).unwrap_or(false)
    }

    fn fail_nth(&self) -> u32 {
        Self::current_fail_nth()
    }

    fn store_fail_nth(&self, n: u32) {
        Self::set_fail_nth(n);
    }

    fn capture_stack(&self, out: &mut [usize]) -> usize {
        SHADOW_STACK
            .try_with(|s| match s.try_borrow() {
                Ok(s) => {
                    let mut n = 0;
                    for (slot, addr) in out.iter_mut().zip(s.iter().rev()) {
                        *slot = *addr;
                        n += 1;
                    }
                    n
                }
                Err(_) => 0,
            })
            .unwrap_or(0)
    }
}

/// Pops the frame pushed by [`ThreadContext::enter_frame`].
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct FrameGuard {
    _private: (),
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        let _ = SHADOW_STACK.try_with(|s| {
            if let Ok(mut s) = s.try_borrow_mut() {
                s.pop();
            }
        });
    }
}

//! faultprobe core: the fault-injection decision engine and its policy state.
//!
//! A probe point owns a [`PolicyState`] and asks a [`FaultInjector`] whether the
//! current invocation should be treated as failed. The engine only produces a
//! verdict; synthesizing the failure is the caller's job.
//!
//! # Guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! The decision path never allocates, blocks, or fails: inconsistent policy
//! values are clamped and the verdict degrades to "do not fail".

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod context;
pub mod engine;
pub mod error;
pub mod policy;
pub mod probes;
pub mod ratelimit;
pub mod report;
pub mod sample;
pub mod setup;

/// Shared result type.
pub use error::{ErrorCode, FaultError, Result};

pub use context::{ExecutionContext, ThreadContext};
pub use engine::{should_fail, should_fail_ex, DecisionEngine, FaultFlags, FaultInjector, NoopEngine};
pub use policy::{AddrRange, PolicyConfig, PolicyState};

//! Top-level facade crate for faultprobe.
//!
//! Re-exports the decision engine and the control surface so programs that
//! embed probe points can depend on a single crate.

pub mod core {
    pub use faultprobe_core::*;
}

pub mod control {
    pub use faultprobe_control::*;
}

/// Everything a probe point needs.
pub mod prelude {
    pub use faultprobe_core::probes::{AllocFlags, PageAllocProbe, SlabCache, SlabProbe};
    pub use faultprobe_core::{
        should_fail, should_fail_ex, FaultFlags, FaultInjector, PolicyConfig, PolicyState,
        ThreadContext,
    };
}

//! Lightweight in-process metrics.
//!
//! Probe counters live in the policies themselves and are read at render
//! time; the control plane only counts its own attribute traffic.

pub mod metrics;

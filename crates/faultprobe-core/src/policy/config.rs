//! Plain-data view of a policy, used for snapshots, YAML and JSON surfaces.

use serde::{Deserialize, Serialize};

use crate::error::{FaultError, Result};
use crate::ratelimit::DEFAULT_BURST;

use super::{AddrRange, MAX_STACK_DEPTH, UNLIMITED};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default = "default_probability")]
    pub probability: u32,

    #[serde(default = "default_interval")]
    pub interval: u64,

    /// Remaining injections; negative means unlimited.
    #[serde(default = "default_times")]
    pub times: i64,

    /// Bytes of sized requests to let through before injecting.
    #[serde(default)]
    pub space: i64,

    #[serde(default = "default_verbose")]
    pub verbose: u32,

    #[serde(default)]
    pub task_filter: bool,

    #[serde(default = "default_stacktrace_depth")]
    pub stacktrace_depth: usize,

    #[serde(default)]
    pub require: Option<AddrRange>,

    #[serde(default)]
    pub reject: Option<AddrRange>,

    /// 0 disables report rate limiting.
    #[serde(default)]
    pub ratelimit_interval_ms: u64,

    #[serde(default = "default_ratelimit_burst")]
    pub ratelimit_burst: u32,

    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            probability: default_probability(),
            interval: default_interval(),
            times: default_times(),
            space: 0,
            verbose: default_verbose(),
            task_filter: false,
            stacktrace_depth: default_stacktrace_depth(),
            require: None,
            reject: None,
            ratelimit_interval_ms: 0,
            ratelimit_burst: default_ratelimit_burst(),
            seed: None,
        }
    }
}

impl PolicyConfig {
    /// Unlimited budget, every call sampled, always fails.
    pub fn always() -> Self {
        Self {
            times: UNLIMITED,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_probability(self.probability)?;
        validate_interval(self.interval)?;
        validate_space(self.space)?;
        validate_stacktrace_depth(self.stacktrace_depth)?;
        for (field, range) in [("require", self.require), ("reject", self.reject)] {
            if let Some(r) = range {
                if r.start > r.end {
                    return Err(FaultError::out_of_range(field, "start must not exceed end"));
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn validate_probability(p: u32) -> Result<()> {
    if p > 100 {
        return Err(FaultError::out_of_range("probability", "must be between 0 and 100"));
    }
    Ok(())
}

pub(crate) fn validate_interval(i: u64) -> Result<()> {
    if i == 0 {
        return Err(FaultError::out_of_range("interval", "must be at least 1"));
    }
    Ok(())
}

pub(crate) fn validate_stacktrace_depth(depth: usize) -> Result<()> {
    if depth > MAX_STACK_DEPTH {
        return Err(FaultError::out_of_range(
            "stacktrace_depth",
            format!("must be at most {MAX_STACK_DEPTH}"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_space(s: i64) -> Result<()> {
    if s < 0 {
        return Err(FaultError::out_of_range("space", "must not be negative"));
    }
    Ok(())
}

fn default_probability() -> u32 {
    100
}
fn default_interval() -> u64 {
    1
}
fn default_times() -> i64 {
    1
}
fn default_verbose() -> u32 {
    2
}
fn default_stacktrace_depth() -> usize {
    MAX_STACK_DEPTH
}
fn default_ratelimit_burst() -> u32 {
    DEFAULT_BURST
}

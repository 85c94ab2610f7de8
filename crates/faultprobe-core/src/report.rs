//! Injection reports.
//!
//! A report is emitted through `tracing` on target `faultprobe` every time a
//! failure is forced, subject to the policy's verbosity and rate limiter.
//! Formatting is lazy: nothing is rendered unless a subscriber records it.

use std::fmt;

use crate::policy::{verbose, PolicyState};

/// Summary of one forced failure.
#[derive(Debug, Clone, Copy)]
pub struct FaultReport<'a> {
    pub name: &'a str,
    pub attempt: u64,
    pub interval: u64,
    pub probability: u32,
    pub space: i64,
    pub times: i64,
    /// Captured caller addresses, innermost first. Empty unless the policy
    /// asked for a full report.
    pub stack: &'a [usize],
}

impl<'a> FaultReport<'a> {
    pub fn new(policy: &'a PolicyState, attempt: u64, stack: &'a [usize]) -> Self {
        let stack = if policy.verbose() >= verbose::STACK { stack } else { &[] };
        Self {
            name: policy.name(),
            attempt,
            interval: policy.interval(),
            probability: policy.probability(),
            space: policy.space(),
            times: policy.times(),
            stack,
        }
    }

    pub fn emit(&self) {
        if self.stack.is_empty() {
            tracing::warn!(
                target: "faultprobe",
                name = %self.name,
                attempt = self.attempt,
                interval = self.interval,
                probability = self.probability,
                space = self.space,
                times = self.times,
                "forcing a failure"
            );
        } else {
            tracing::warn!(
                target: "faultprobe",
                name = %self.name,
                attempt = self.attempt,
                interval = self.interval,
                probability = self.probability,
                space = self.space,
                times = self.times,
                stack = %Frames(self.stack),
                "forcing a failure"
            );
        }
    }
}

impl fmt::Display for FaultReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "forcing a failure: name {}, attempt {}, interval {}, probability {}, space {}, times {}",
            self.name, self.attempt, self.interval, self.probability, self.space, self.times
        )?;
        if !self.stack.is_empty() {
            write!(f, "\n{}", Frames(self.stack))?;
        }
        Ok(())
    }
}

/// One frame per line, `#<n> <addr>`.
pub struct Frames<'a>(pub &'a [usize]);

impl fmt::Display for Frames<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, addr) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "#{i} {addr:#018x}")?;
        }
        Ok(())
    }
}

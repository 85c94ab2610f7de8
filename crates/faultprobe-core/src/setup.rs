//! Single-string policy setup: `<interval>,<probability>,<space>,<times>`.
//!
//! This is the compact form accepted on command lines and environment
//! variables, e.g. `FAIL_PAGE_ALLOC=10,25,0,-1` (every 10th call, 25%,
//! no space, unlimited). An optional `name=` prefix is ignored.
//!
//! Parsing rules:
//! - All four fields are required; surrounding whitespace is allowed.
//! - Values are validated before anything is stored, so a rejected string
//!   leaves the policy exactly as it was.

use crate::error::{FaultError, Result};
use crate::policy::{validate_interval, validate_probability, validate_space, PolicyState};

/// Parsed setup string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetupParams {
    pub interval: u64,
    pub probability: u32,
    pub space: i64,
    pub times: i64,
}

pub fn parse_setup(raw: &str) -> Result<SetupParams> {
    let s = raw.trim();
    let s = match s.split_once('=') {
        Some((_name, rest)) => rest.trim(),
        None => s,
    };

    let mut it = s.split(',').map(str::trim);
    let mut next = |what: &'static str| {
        it.next()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| FaultError::Parse(format!("missing {what} in {raw:?}")))
    };

    let interval = next("interval")?;
    let probability = next("probability")?;
    let space = next("space")?;
    let times = next("times")?;
    if it.next().is_some() {
        return Err(FaultError::Parse(format!(
            "too many fields in {raw:?} (expected interval,probability,space,times)"
        )));
    }

    let params = SetupParams {
        interval: field(interval, "interval")?,
        probability: field(probability, "probability")?,
        space: field(space, "space")?,
        times: i64::from(field::<i32>(times, "times")?),
    };

    validate_interval(params.interval)?;
    validate_probability(params.probability)?;
    validate_space(params.space)?;
    Ok(params)
}

fn field<T: std::str::FromStr>(s: &str, name: &'static str) -> Result<T> {
    s.parse()
        .map_err(|_| FaultError::Parse(format!("invalid {name}: {s:?}")))
}

impl PolicyState {
    /// Parse `raw` and store interval, probability, space and times.
    pub fn setup(&self, raw: &str) -> Result<SetupParams> {
        let p = parse_setup(raw).inspect_err(|e| {
            tracing::warn!(name = %self.name(), input = %raw, error = %e, "fault setup rejected");
        })?;
        self.set_interval(p.interval)?;
        self.set_probability(p.probability)?;
        self.set_space(p.space)?;
        self.set_times(p.times);
        tracing::info!(
            name = %self.name(),
            interval = p.interval,
            probability = p.probability,
            space = p.space,
            times = p.times,
            "fault setup applied"
        );
        Ok(p)
    }
}

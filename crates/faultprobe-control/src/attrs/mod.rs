//! Named policy attributes.
//!
//! Each attribute reads and writes exactly one policy field as text, so the
//! tree can be driven by `curl` or a shell script. Formats:
//! - counters and levels: decimal (`times` is signed)
//! - `task-filter`: `Y` / `N` (also accepts `1`/`0`, `true`/`false`)
//! - addresses: `0x%016x` on read; hex with `0x` or decimal on write

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use faultprobe_core::error::{FaultError, Result};
use faultprobe_core::PolicyState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attr {
    Probability,
    Interval,
    Times,
    Space,
    Verbose,
    VerboseRatelimitIntervalMs,
    VerboseRatelimitBurst,
    TaskFilter,
    StacktraceDepth,
    RequireStart,
    RequireEnd,
    RejectStart,
    RejectEnd,
}

impl Attr {
    pub const ALL: [Attr; 13] = [
        Attr::Probability,
        Attr::Interval,
        Attr::Times,
        Attr::Space,
        Attr::Verbose,
        Attr::VerboseRatelimitIntervalMs,
        Attr::VerboseRatelimitBurst,
        Attr::TaskFilter,
        Attr::StacktraceDepth,
        Attr::RequireStart,
        Attr::RequireEnd,
        Attr::RejectStart,
        Attr::RejectEnd,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Attr::Probability => "probability",
            Attr::Interval => "interval",
            Attr::Times => "times",
            Attr::Space => "space",
            Attr::Verbose => "verbose",
            Attr::VerboseRatelimitIntervalMs => "verbose_ratelimit_interval_ms",
            Attr::VerboseRatelimitBurst => "verbose_ratelimit_burst",
            Attr::TaskFilter => "task-filter",
            Attr::StacktraceDepth => "stacktrace-depth",
            Attr::RequireStart => "require-start",
            Attr::RequireEnd => "require-end",
            Attr::RejectStart => "reject-start",
            Attr::RejectEnd => "reject-end",
        }
    }
}

impl fmt::Display for Attr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Attr {
    type Err = FaultError;

    fn from_str(s: &str) -> Result<Self> {
        Attr::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| FaultError::UnknownAttribute(s.to_string()))
    }
}

/// Render one attribute.
pub fn read(policy: &PolicyState, attr: Attr) -> String {
    match attr {
        Attr::Probability => policy.probability().to_string(),
        Attr::Interval => policy.interval().to_string(),
        Attr::Times => policy.times().to_string(),
        Attr::Space => policy.space().to_string(),
        Attr::Verbose => policy.verbose().to_string(),
        Attr::VerboseRatelimitIntervalMs => policy.ratelimit().interval().as_millis().to_string(),
        Attr::VerboseRatelimitBurst => policy.ratelimit().burst().to_string(),
        Attr::TaskFilter => (if policy.task_filter() { "Y" } else { "N" }).to_string(),
        Attr::StacktraceDepth => policy.stacktrace_depth().to_string(),
        Attr::RequireStart => hex(policy.require_start()),
        Attr::RequireEnd => hex(policy.require_end()),
        Attr::RejectStart => hex(policy.reject_start()),
        Attr::RejectEnd => hex(policy.reject_end()),
    }
}

/// Parse `raw` and store it. The policy is untouched on error.
pub fn write(policy: &PolicyState, attr: Attr, raw: &str) -> Result<()> {
    let v = raw.trim();
    match attr {
        Attr::Probability => policy.set_probability(num(attr, v)?),
        Attr::Interval => policy.set_interval(num(attr, v)?),
        Attr::Times => {
            policy.set_times(num(attr, v)?);
            Ok(())
        }
        Attr::Space => policy.set_space(num(attr, v)?),
        Attr::Verbose => {
            policy.set_verbose(num(attr, v)?);
            Ok(())
        }
        Attr::VerboseRatelimitIntervalMs => {
            policy
                .ratelimit()
                .set_interval(Duration::from_millis(num(attr, v)?));
            Ok(())
        }
        Attr::VerboseRatelimitBurst => {
            policy.ratelimit().set_burst(num(attr, v)?);
            Ok(())
        }
        Attr::TaskFilter => {
            policy.set_task_filter(boolean(attr, v)?);
            Ok(())
        }
        Attr::StacktraceDepth => policy.set_stacktrace_depth(num(attr, v)?),
        Attr::RequireStart => {
            policy.set_require_start(addr(attr, v)?);
            Ok(())
        }
        Attr::RequireEnd => {
            policy.set_require_end(addr(attr, v)?);
            Ok(())
        }
        Attr::RejectStart => {
            policy.set_reject_start(addr(attr, v)?);
            Ok(())
        }
        Attr::RejectEnd => {
            policy.set_reject_end(addr(attr, v)?);
            Ok(())
        }
    }
}

/// Every attribute of `policy`, in tree order.
pub fn dump(policy: &PolicyState) -> Vec<(Attr, String)> {
    Attr::ALL.into_iter().map(|a| (a, read(policy, a))).collect()
}

fn hex(v: usize) -> String {
    format!("{v:#018x}")
}

fn num<T: FromStr>(attr: Attr, v: &str) -> Result<T> {
    v.parse()
        .map_err(|_| FaultError::Parse(format!("{attr}: invalid number {v:?}")))
}

fn boolean(attr: Attr, v: &str) -> Result<bool> {
    match v {
        "Y" | "y" | "1" | "true" => Ok(true),
        "N" | "n" | "0" | "false" => Ok(false),
        _ => Err(FaultError::Parse(format!("{attr}: expected Y or N, got {v:?}"))),
    }
}

fn addr(attr: Attr, v: &str) -> Result<usize> {
    let parsed = match v.strip_prefix("0x").or_else(|| v.strip_prefix("0X")) {
        Some(h) => usize::from_str_radix(h, 16),
        None => v.parse(),
    };
    parsed.map_err(|_| FaultError::Parse(format!("{attr}: invalid address {v:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultprobe_core::error::ErrorCode;

    #[test]
    fn names_round_trip() {
        for a in Attr::ALL {
            assert_eq!(a.as_str().parse::<Attr>().unwrap(), a);
        }
        assert_eq!(
            "nope".parse::<Attr>().unwrap_err().code(),
            ErrorCode::UnknownAttribute
        );
    }

    #[test]
    fn addresses_are_hex() {
        let p = PolicyState::new("p");
        assert_eq!(read(&p, Attr::RequireEnd), format!("{:#018x}", usize::MAX));
        write(&p, Attr::RequireStart, "0xffff0000").unwrap();
        write(&p, Attr::RequireEnd, "4294901776").unwrap();
        assert_eq!(read(&p, Attr::RequireStart), "0x00000000ffff0000");
        assert_eq!(read(&p, Attr::RequireEnd), "0x00000000ffff0010");
    }

    #[test]
    fn task_filter_flag() {
        let p = PolicyState::new("p");
        assert_eq!(read(&p, Attr::TaskFilter), "N");
        write(&p, Attr::TaskFilter, "Y\n").unwrap();
        assert!(p.task_filter());
        assert!(write(&p, Attr::TaskFilter, "maybe").is_err());
    }

    #[test]
    fn invalid_writes_leave_value() {
        let p = PolicyState::new("p");
        assert_eq!(
            write(&p, Attr::Probability, "150").unwrap_err().code(),
            ErrorCode::OutOfRange
        );
        assert_eq!(
            write(&p, Attr::Interval, "-3").unwrap_err().code(),
            ErrorCode::Parse
        );
        assert_eq!(p.probability(), 100);
        assert_eq!(p.interval(), 1);
    }

    #[test]
    fn stacktrace_depth_above_buffer_is_out_of_range() {
        let p = PolicyState::new("p");
        assert_eq!(
            write(&p, Attr::StacktraceDepth, "33").unwrap_err().code(),
            ErrorCode::OutOfRange
        );
        assert_eq!(read(&p, Attr::StacktraceDepth), "32");
        write(&p, Attr::StacktraceDepth, "8").unwrap();
        assert_eq!(read(&p, Attr::StacktraceDepth), "8");
    }

    #[test]
    fn signed_times() {
        let p = PolicyState::new("p");
        write(&p, Attr::Times, "-1").unwrap();
        assert!(p.is_unlimited());
        assert_eq!(read(&p, Attr::Times), "-1");
    }
}

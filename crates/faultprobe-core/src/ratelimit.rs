//! Lock-free token bucket guarding diagnostic output.
//!
//! `burst` reports are admitted per `interval`; the bucket is refilled in one
//! step when a new window opens. An interval of zero disables limiting.
//! Every operation is a handful of atomics so the limiter can be consulted
//! from the decision path without blocking.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default burst when limiting is enabled without an explicit burst.
pub const DEFAULT_BURST: u32 = 10;

#[derive(Debug)]
pub struct RateLimiter {
    interval_ms: AtomicU64,
    burst: AtomicU32,
    tokens: AtomicU32,
    window_start_ms: AtomicU64,
    missed: AtomicU64,
    epoch: Instant,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::disabled()
    }
}

impl RateLimiter {
    /// Unbounded limiter (every report admitted).
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, DEFAULT_BURST)
    }

    pub fn new(interval: Duration, burst: u32) -> Self {
        Self {
            interval_ms: AtomicU64::new(duration_ms(interval)),
            burst: AtomicU32::new(burst),
            tokens: AtomicU32::new(burst),
            window_start_ms: AtomicU64::new(0),
            missed: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.load(Ordering::Relaxed))
    }

    pub fn burst(&self) -> u32 {
        self.burst.load(Ordering::Relaxed)
    }

    pub fn is_enabled(&self) -> bool {
        self.interval_ms.load(Ordering::Relaxed) != 0
    }

    /// Reports rejected since the current window opened.
    pub fn missed(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }

    pub fn set_interval(&self, interval: Duration) {
        self.interval_ms.store(duration_ms(interval), Ordering::Relaxed);
    }

    /// Change the burst and refill the bucket to it.
    pub fn set_burst(&self, burst: u32) {
        self.burst.store(burst, Ordering::Relaxed);
        self.tokens.store(burst, Ordering::Release);
    }

    /// Consume one token. Returns `false` when the report must be dropped.
    pub fn allow(&self) -> bool {
        let interval = self.interval_ms.load(Ordering::Relaxed);
        if interval == 0 {
            return true;
        }

        let now = self.now_ms();
        let start = self.window_start_ms.load(Ordering::Acquire);
        if (start == 0 || now.saturating_sub(start) >= interval)
            && self
                .window_start_ms
                .compare_exchange(start, now, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
        {
            self.tokens.store(self.burst.load(Ordering::Relaxed), Ordering::Release);
            let missed = self.missed.swap(0, Ordering::Relaxed);
            if missed > 0 {
                tracing::warn!(target: "faultprobe", missed, "fault reports suppressed");
            }
        }

        let admitted = self
            .tokens
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |t| t.checked_sub(1))
            .is_ok();
        if !admitted {
            self.missed.fetch_add(1, Ordering::Relaxed);
        }
        admitted
    }

    /// Milliseconds since construction, plus one. A window start of zero
    /// means no window has been opened yet.
    fn now_ms(&self) -> u64 {
        duration_ms(self.epoch.elapsed()).saturating_add(1)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_admits_everything() {
        let rl = RateLimiter::disabled();
        assert!(!rl.is_enabled());
        assert!((0..1000).all(|_| rl.allow()));
        assert_eq!(rl.missed(), 0);
    }

    #[test]
    fn burst_caps_a_window() {
        let rl = RateLimiter::new(Duration::from_secs(3600), 3);
        let admitted = (0..10).filter(|_| rl.allow()).count();
        assert_eq!(admitted, 3);
        assert_eq!(rl.missed(), 7);
    }

    #[test]
    fn new_window_refills() {
        let rl = RateLimiter::new(Duration::from_millis(10), 1);
        assert!(rl.allow());
        assert!(!rl.allow());
        std::thread::sleep(Duration::from_millis(30));
        assert!(rl.allow());
        assert_eq!(rl.missed(), 0);
    }

    #[test]
    fn shortened_interval_applies_to_open_window() {
        let rl = RateLimiter::new(Duration::from_secs(3600), 1);
        assert!(rl.allow());
        assert!(!rl.allow());
        rl.set_interval(Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(50));
        assert!(rl.allow());
        assert_eq!(rl.missed(), 0);
    }

    #[test]
    fn set_burst_refills_immediately() {
        let rl = RateLimiter::new(Duration::from_secs(3600), 1);
        assert!(rl.allow());
        assert!(!rl.allow());
        rl.set_burst(2);
        assert!(rl.allow());
        assert!(rl.allow());
        assert!(!rl.allow());
    }
}

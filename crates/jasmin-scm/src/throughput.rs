//! Per-connector throughput shaping (§4.4 `submit_sm_throughput`, "0 =
//! unlimited"). A fixed one-second window counter, reset on rollover —
//! simpler than a token bucket and sufficient for the coarse per-second
//! cap the data model specifies.

use std::time::{Duration, Instant};

pub struct ThroughputLimiter {
    limit_per_sec: u32,
    window_start: Instant,
    sent_in_window: u32,
}

impl ThroughputLimiter {
    pub fn new(limit_per_sec: u32) -> Self {
        Self {
            limit_per_sec,
            window_start: Instant::now(),
            sent_in_window: 0,
        }
    }

    fn roll_window(&mut self, now: Instant) {
        if now.duration_since(self.window_start) >= Duration::from_secs(1) {
            self.window_start = now;
            self.sent_in_window = 0;
        }
    }

    /// True if one more submission fits in the current window; `0` means
    /// unlimited and always permits.
    pub fn try_acquire(&mut self) -> bool {
        if self.limit_per_sec == 0 {
            return true;
        }
        self.roll_window(Instant::now());
        if self.sent_in_window < self.limit_per_sec {
            self.sent_in_window += 1;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlimited_always_permits() {
        let mut limiter = ThroughputLimiter::new(0);
        for _ in 0..1000 {
            assert!(limiter.try_acquire());
        }
    }

    #[test]
    fn caps_at_the_configured_rate_within_one_window() {
        let mut limiter = ThroughputLimiter::new(3);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }
}

//! Backoff policy shared by connector reconnection (§4.4 "reconnect
//! policy") and submit_sm_resp error retrial (§4.4 "re-publish to MB with
//! exponential-ish backoff"). Adapted from the Lazy Pirate pattern's
//! capped-backoff config, applied here to AMQP/SMPP reconnects instead of
//! ZMQ request-reply.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(60),
        }
    }
}

impl BackoffPolicy {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self { base, max }
    }

    /// Delay before the `attempt`-th retry (1-based). Attempt 0 means "no
    /// delay yet". §6 specifies "fixed delay × attempt" for submit error
    /// retrial, which this also covers as the degenerate case of a
    /// reconnect policy with `base == max` held constant — callers that
    /// want pure exponential growth use `exponential_for_attempt` instead.
    pub fn fixed_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        std::cmp::min(self.base.saturating_mul(attempt), self.max)
    }

    /// Exponential backoff capped at `max`, used for connector reconnects.
    pub fn exponential_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        std::cmp::min(self.base.saturating_mul(multiplier), self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_scales_linearly_with_attempt() {
        let policy = BackoffPolicy::new(Duration::from_secs(30), Duration::from_secs(300));
        assert_eq!(policy.fixed_for_attempt(0), Duration::ZERO);
        assert_eq!(policy.fixed_for_attempt(1), Duration::from_secs(30));
        assert_eq!(policy.fixed_for_attempt(2), Duration::from_secs(60));
    }

    #[test]
    fn exponential_backoff_caps_at_max() {
        let policy = BackoffPolicy::new(Duration::from_millis(500), Duration::from_secs(5));
        assert_eq!(policy.exponential_for_attempt(1), Duration::from_millis(500));
        assert_eq!(policy.exponential_for_attempt(2), Duration::from_millis(1000));
        assert_eq!(policy.exponential_for_attempt(20), Duration::from_secs(5));
    }
}

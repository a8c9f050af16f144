// Retry timing for device detection, with exponential backoff

use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ReconnectionStrategy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    current_attempt: u32,
}

impl ReconnectionStrategy {
    /// 1 s, doubling up to 30 s, 10 attempts
    pub fn new() -> Self {
        Self::with_limits(10, 1000, 30_000)
    }

    pub fn with_limits(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
            current_attempt: 0,
        }
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.current_attempt >= self.max_attempts {
            return None;
        }

        // base * 2^attempt, saturating so large attempt counts just hit the cap
        let factor = 1u64.checked_shl(self.current_attempt).unwrap_or(u64::MAX);
        let delay_ms = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);

        self.current_attempt += 1;
        if self.current_attempt == self.max_attempts {
            warn!(attempts = self.max_attempts, "last device detection attempt");
        }

        Some(Duration::from_millis(delay_ms))
    }

    /// Start over after a successful connection
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }

    pub fn should_retry(&self) -> bool {
        self.current_attempt < self.max_attempts
    }

    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }
}

impl Default for ReconnectionStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let mut strategy = ReconnectionStrategy::new();
        let delays: Vec<u64> = std::iter::from_fn(|| strategy.next_delay())
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(
            delays,
            vec![1000, 2000, 4000, 8000, 16000, 30000, 30000, 30000, 30000, 30000]
        );
        assert!(!strategy.should_retry());
    }

    #[test]
    fn test_reset() {
        let mut strategy = ReconnectionStrategy::new();
        strategy.next_delay();
        strategy.next_delay();
        assert_eq!(strategy.current_attempt(), 2);

        strategy.reset();
        assert_eq!(strategy.current_attempt(), 0);
        assert_eq!(strategy.next_delay(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_large_attempt_counts_stay_capped() {
        let mut strategy = ReconnectionStrategy::with_limits(80, 1000, 5000);
        let last = std::iter::from_fn(|| strategy.next_delay()).last();
        assert_eq!(last, Some(Duration::from_millis(5000)));
    }
}

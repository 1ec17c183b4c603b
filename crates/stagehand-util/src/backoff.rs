//! Bounded exponential backoff

use std::time::Duration;

/// Retry schedule with a fixed attempt ceiling and doubling delays.
///
/// `attempts` counts total tries, so `attempts = 3` means one initial try
/// plus two retries. The delay before retry `n` is `base * 2^(n-1)`, capped
/// at `max_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub attempts: u32,
    pub base: Duration,
    pub max_delay: Duration,
}

impl Backoff {
    pub fn new(attempts: u32, base: Duration) -> Self {
        Self {
            attempts,
            base,
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Delay to sleep before the retry following failed attempt `attempt`
    /// (1-based). `None` once the attempt ceiling is reached.
    pub fn delay_after(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.attempts {
            return None;
        }
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        Some((self.base * factor).min(self.max_delay))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

use cashtag_config::{BackoffKind, RetryConfig};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed,
    /// Doubles after every failure up to `max_delay`.
    Exponential { max_delay: Duration },
}

/// How often and how patiently the driver retries a transient search failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts for one page, the first included.
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff: Backoff,
    /// Wall-clock budget for one page across all attempts.
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(10, Duration::from_secs(5))
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Fixed,
            max_elapsed: None,
        }
    }

    pub fn exponential(max_attempts: u32, delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff: Backoff::Exponential { max_delay },
            max_elapsed: None,
        }
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Option<Duration>) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    /// Wait before the next attempt after `failures` consecutive failures.
    pub fn delay_for(&self, failures: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.delay,
            Backoff::Exponential { max_delay } => {
                let shift = failures.saturating_sub(1).min(16);
                self.delay.saturating_mul(1u32 << shift).min(max_delay)
            }
        }
    }

    /// Whether another attempt may start after `attempts` tries taking `elapsed`.
    pub fn allows_retry(&self, attempts: u32, elapsed: Duration) -> bool {
        if attempts >= self.max_attempts {
            return false;
        }
        match self.max_elapsed {
            Some(budget) => elapsed.saturating_add(self.delay_for(attempts)) <= budget,
            None => true,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        let delay = Duration::from_millis(cfg.delay_ms);
        let policy = match cfg.backoff {
            BackoffKind::Fixed => Self::fixed(cfg.max_attempts, delay),
            BackoffKind::Exponential => Self::exponential(
                cfg.max_attempts,
                delay,
                Duration::from_millis(cfg.max_delay_ms),
            ),
        };
        policy.with_max_elapsed(cfg.max_elapsed_secs.map(Duration::from_secs))
    }
}

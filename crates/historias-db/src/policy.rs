//! Retry policies: how many failed connection attempts are tolerated and how
//! long to wait between them.

use std::time::Duration;

/// Default number of failed attempts before switching to mock mode.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Default delay between connection attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(5000);

/// Delay strategy between connection attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),

    /// Delay doubles (by `multiplier`) after every failure, capped at `max`.
    Exponential {
        /// Delay before the first retry.
        initial: Duration,
        /// Upper bound on the delay.
        max: Duration,
        /// Growth factor per failed attempt.
        multiplier: f64,
    },
}

/// Retry budget and backoff for connection attempts.
///
/// Once `failed_attempts >= max_retries` the manager gives up on the live
/// database for the rest of the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Create a fixed delay policy
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed(delay),
        }
    }

    /// Create an exponential backoff policy
    ///
    /// # Arguments
    /// * `max_retries` - Failed attempts tolerated before mock mode
    /// * `initial_delay` - Starting delay (e.g., 100ms)
    /// * `max_delay` - Maximum delay cap (e.g., 5 seconds)
    pub fn exponential(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Exponential {
                initial: initial_delay,
                max: max_delay,
                multiplier: 2.0,
            },
        }
    }

    /// Returns the retry budget.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns the backoff strategy.
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Returns a copy with a different retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Returns `true` once `failed_attempts` has used up the budget.
    pub fn is_exhausted(&self, failed_attempts: u32) -> bool {
        failed_attempts >= self.max_retries
    }

    /// Get the delay before the retry that follows `failed_attempts` failures.
    pub fn delay_for_attempt(&self, failed_attempts: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exponent = failed_attempts.saturating_sub(1).min(32) as i32;
                let scaled = initial.as_secs_f64() * multiplier.powi(exponent);
                if scaled.is_finite() && scaled < max.as_secs_f64() {
                    Duration::from_secs_f64(scaled)
                } else {
                    max
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // Five attempts, five seconds apart
        Self::fixed(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY)
    }
}

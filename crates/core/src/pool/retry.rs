//! Fixed-delay retry policy for connection acquisition.
//!
//! The delay between attempts is constant (never exponential). An optional
//! jitter spreads concurrent retries over `delay * (1 ± jitter)` so that many
//! requests failing together do not retry in lock-step.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    jitter: f64,
}

impl RetryPolicy {
    /// Creates a policy with `max_attempts` total attempts (at least one) and a
    /// fixed `delay` between them.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            jitter: 0.0,
        }
    }

    /// Sets the jitter ratio, clamped to `[0.0, 1.0]`.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Returns true if another attempt is allowed after `attempt` (1-based)
    /// has failed.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to sleep before the next attempt.
    pub fn next_delay(&self) -> Duration {
        if self.jitter == 0.0 {
            return self.delay;
        }
        let sample = rand::rng().random_range(-1.0..=1.0);
        self.jittered(sample)
    }

    /// Delay for a jitter sample in `[-1.0, 1.0]`.
    pub fn jittered(&self, sample: f64) -> Duration {
        let factor = 1.0 + self.jitter * sample.clamp(-1.0, 1.0);
        self.delay.mul_f64(factor.max(0.0))
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, 1 second apart, no jitter.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

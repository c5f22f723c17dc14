//! Exponential backoff configuration for bus publishes.
//!
//! Publish retries are an explicit bounded-attempt loop (see
//! [`super::publisher`]) rather than a wrapper combinator, so the retry and
//! error boundaries stay visible. The sleep between attempts goes through
//! the [`Sleep`] trait, which tests replace with a recorder instead of
//! waiting out real delays.

use std::time::Duration;

use async_trait::async_trait;

/// Configuration for exponential backoff retry.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total number of attempts, including the initial one.
    pub max_attempts: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Cap for exponential growth.
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (typically 2.0).
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Default retry configuration for bus publishes.
    ///
    /// - 3 attempts total, with 500ms and 1s backoff delays between them
    /// - Total max wait: 1.5 seconds
    ///
    /// The bound is deliberately small: the webhook sender is holding an
    /// open HTTP connection while we retry.
    pub const DEFAULT: Self = Self {
        max_attempts: 3,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(4),
        backoff_multiplier: 2.0,
    };

    /// Creates a new retry configuration.
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Computes the delay after the given attempt (1-indexed).
    ///
    /// The delay grows exponentially:
    /// `initial_delay * backoff_multiplier^(attempt - 1)`, capped at
    /// `max_delay`.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.backoff_multiplier.powi(exponent as i32);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped_secs)
    }

    /// Returns an iterator over all backoff delays.
    ///
    /// With `max_attempts` attempts there are `max_attempts - 1` sleeps.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(|attempt| self.delay_after_attempt(attempt))
    }

    /// Computes the total maximum wait time across all retries.
    pub fn total_max_wait(&self) -> Duration {
        self.delays().sum()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Clock abstraction for backoff sleeps.
///
/// Production uses [`TokioSleep`]; tests inject a recorder so retry behavior
/// is asserted on without real delays.
#[async_trait]
pub trait Sleep: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleep;

#[async_trait]
impl Sleep for TokioSleep {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records requested delays instead of sleeping.
    #[derive(Debug, Default)]
    pub struct RecordingSleep {
        delays: Mutex<Vec<Duration>>,
    }

    impl RecordingSleep {
        pub fn recorded(&self) -> Vec<Duration> {
            self.delays.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Sleep for RecordingSleep {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }
}

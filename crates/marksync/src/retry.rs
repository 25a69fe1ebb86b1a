//! Retry and pacing configuration shared by the vendor API clients.
//!
//! Both the bookmark source and the mirror store go through the same
//! [`crate::api::ApiClient`], which consumes the backoff schedule built here.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBackoff, ExponentialBuilder};

use crate::http::HttpResponse;

/// Maximum backoff delay in milliseconds when rate limited.
pub const MAX_BACKOFF_MS: u64 = 60_000;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 1_000;

/// Growth factor applied to the delay after every failed attempt.
pub const BACKOFF_FACTOR: f32 = 2.0;

/// Maximum retries for a single API call.
pub const MAX_RETRIES: usize = 5;

/// Configuration for retry operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Minimum delay between retries.
    pub min_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier applied per attempt.
    pub factor: f32,
    /// Maximum number of retry attempts.
    pub max_retries: usize,
    /// Whether to add jitter to delays.
    pub with_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_millis(INITIAL_BACKOFF_MS),
            max_delay: Duration::from_millis(MAX_BACKOFF_MS),
            factor: BACKOFF_FACTOR,
            max_retries: MAX_RETRIES,
            with_jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration with custom values.
    #[must_use]
    pub fn new(min_delay: Duration, max_delay: Duration, max_retries: usize) -> Self {
        Self {
            min_delay,
            max_delay,
            max_retries,
            ..Self::default()
        }
    }

    /// Set whether to use jitter.
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.with_jitter = jitter;
        self
    }

    /// Build an exponential backoff strategy from this configuration.
    #[must_use]
    pub fn into_backoff(self) -> ExponentialBuilder {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor)
            .with_max_times(self.max_retries);

        if self.with_jitter {
            builder = builder.with_jitter();
        }

        builder
    }

    /// Build the delay schedule for one call.
    ///
    /// The iterator yields one delay per permitted retry and is exhausted once
    /// the retry budget is spent.
    #[must_use]
    pub fn schedule(&self) -> ExponentialBackoff {
        self.clone().into_backoff().build()
    }

    /// Pick the delay before the next attempt.
    ///
    /// A server-provided hint wins over the computed backoff but is still
    /// capped at `max_delay`.
    #[must_use]
    pub fn next_delay(&self, computed: Duration, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.min(self.max_delay),
            None => computed,
        }
    }
}

/// Read a `Retry-After` hint (delta seconds) from a response.
#[must_use]
pub fn retry_after(response: &HttpResponse) -> Option<Duration> {
    let raw = response.header("retry-after")?.trim();
    let seconds: f64 = raw.parse().ok()?;
    // Negative, NaN and out-of-range values are ignored.
    Duration::try_from_secs_f64(seconds).ok()
}

//! Retry configuration for automatic request retry.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::header::RETRY_AFTER;

/// Millisecond-precision variant of `Retry-After` sent by App Configuration.
const RETRY_AFTER_MS: &str = "retry-after-ms";

/// Also sent by some Azure front ends.
const X_MS_RETRY_AFTER_MS: &str = "x-ms-retry-after-ms";

/// Configuration for automatic retry behavior.
///
/// Controls how the client handles transient failures such as throttling (429),
/// server errors (5xx), and network errors.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use appconfig_lib::retry::RetryConfig;
///
/// // Default configuration
/// let config = RetryConfig::default();
///
/// // Custom configuration
/// let custom = RetryConfig::default()
///     .max_retries(5)
///     .initial_delay(Duration::from_millis(500))
///     .max_delay(Duration::from_secs(60));
///
/// // Disable all retries
/// let no_retry = RetryConfig::no_retry();
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt).
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Whether to retry on HTTP 429 (throttled).
    pub retry_on_429: bool,
    /// Whether to retry on HTTP 5xx (server errors).
    pub retry_on_5xx: bool,
    /// Whether to retry on network errors.
    pub retry_on_network: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retry_on_429: true,
            retry_on_5xx: true,
            retry_on_network: true,
        }
    }
}

impl RetryConfig {
    /// Creates a config with all retries disabled.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            retry_on_429: false,
            retry_on_5xx: false,
            retry_on_network: false,
            ..Default::default()
        }
    }

    /// Sets the maximum number of retries.
    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    /// Sets the initial delay between retries.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enables or disables retry on HTTP 429.
    pub fn retry_on_429(mut self, enabled: bool) -> Self {
        self.retry_on_429 = enabled;
        self
    }

    /// Enables or disables retry on HTTP 5xx.
    pub fn retry_on_5xx(mut self, enabled: bool) -> Self {
        self.retry_on_5xx = enabled;
        self
    }

    /// Enables or disables retry on network errors.
    pub fn retry_on_network(mut self, enabled: bool) -> Self {
        self.retry_on_network = enabled;
        self
    }

    /// Delay following `delay`, doubled and capped at `max_delay`.
    pub(crate) fn next_delay(&self, delay: Duration) -> Duration {
        (delay * 2).min(self.max_delay)
    }
}

/// Reads the server-suggested delay from `retry-after-ms`,
/// `x-ms-retry-after-ms` or `Retry-After` (seconds), in that order.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = |name: &str| headers.get(name)?.to_str().ok()?.trim().parse::<f64>().ok();

    let millis = header(RETRY_AFTER_MS).or_else(|| header(X_MS_RETRY_AFTER_MS));
    let from_millis = millis
        .map(|ms| ms * 1_000_000.0)
        .filter(|nanos| *nanos >= 0.0 && *nanos < u64::MAX as f64)
        .map(|nanos| Duration::from_nanos(nanos as u64));
    if from_millis.is_some() {
        return from_millis;
    }

    header(RETRY_AFTER.as_str()).and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

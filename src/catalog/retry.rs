//! Fixed-delay retry policy and failure classification for catalog requests.
//!
//! Every catalog request failure is classified into a [`FailureType`]:
//! - [`FailureType::Transient`] - timeouts, connection errors, 5xx, 408
//! - [`FailureType::RateLimited`] - 429, or 403 with an exhausted quota
//! - [`FailureType::Permanent`] - other 4xx, malformed locators
//!
//! [`RetryPolicy::should_retry`] then decides whether another attempt is made.
//! Rate-limited failures are handled by the client as a separate wait loop
//! that does not consume attempts; the policy only bounds those waits.

use std::time::Duration;

use tracing::{debug, instrument};

use super::CatalogError;
use crate::config::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};

/// Maximum number of rate-limit waits for one logical request.
pub const DEFAULT_MAX_RATE_LIMIT_WAITS: u32 = 5;

/// Classification of catalog request failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Temporary failure that may succeed on retry.
    Transient,
    /// Failure that will not succeed regardless of retries.
    Permanent,
    /// Server-side rate limiting; wait, then repeat the same attempt.
    RateLimited,
}

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Which attempt number this will be (1-indexed).
        attempt: u32,
    },
    /// Do not retry.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Bounded retry with a constant inter-attempt delay.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
    max_rate_limit_waits: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
            max_rate_limit_waits: DEFAULT_MAX_RATE_LIMIT_WAITS,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with `max_attempts` (at least 1) and a fixed `delay`.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            max_rate_limit_waits: DEFAULT_MAX_RATE_LIMIT_WAITS,
        }
    }

    /// Overrides the bound on rate-limit waits.
    #[must_use]
    pub fn with_max_rate_limit_waits(mut self, waits: u32) -> Self {
        self.max_rate_limit_waits = waits;
        self
    }

    /// Returns the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the fixed inter-attempt delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns the bound on rate-limit waits.
    #[must_use]
    pub fn max_rate_limit_waits(&self) -> u32 {
        self.max_rate_limit_waits
    }

    /// Determines whether to retry after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = self.delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}

/// Classifies a catalog error for retry decisions.
#[must_use]
pub fn classify_error(error: &CatalogError) -> FailureType {
    match error {
        CatalogError::HttpStatus {
            status,
            quota_exhausted,
            ..
        } => classify_http_status(*status, *quota_exhausted),
        CatalogError::Timeout { .. } | CatalogError::Network { .. } => FailureType::Transient,
        CatalogError::InvalidLocator { .. }
        | CatalogError::ClientBuild { .. }
        | CatalogError::RateLimited { .. } => FailureType::Permanent,
    }
}

/// Classifies an HTTP status code.
#[allow(clippy::match_same_arms)]
fn classify_http_status(status: u16, quota_exhausted: bool) -> FailureType {
    match status {
        429 => FailureType::RateLimited,
        403 if quota_exhausted => FailureType::RateLimited,
        408 => FailureType::Transient,
        status if (400..500).contains(&status) => FailureType::Permanent,
        status if (500..600).contains(&status) => FailureType::Transient,
        _ => FailureType::Permanent,
    }
}

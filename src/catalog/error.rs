//! Error types for catalog queries and recipe fetches.

use thiserror::Error;

/// Errors raised by [`super::CatalogClient`] after retries are exhausted.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network-level error (DNS, connection refused, TLS, body read).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request exceeded its timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present.
        retry_after: Option<String>,
        /// Whether the response reported an exhausted request quota.
        quota_exhausted: bool,
    },

    /// Locator is neither an absolute URL nor resolvable against the catalog base.
    #[error("invalid locator: {locator}")]
    InvalidLocator {
        /// The offending locator.
        locator: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// Rate-limit waits exceeded their bound.
    #[error("rate limited requesting {url} after {waits} waits")]
    RateLimited {
        /// The URL that kept being rate limited.
        url: String,
        /// Number of waits performed.
        waits: u32,
    },
}

impl CatalogError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
            quota_exhausted: false,
        }
    }

    /// Creates an HTTP status error carrying rate-limit hints.
    pub fn http_status_with_hints(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
        quota_exhausted: bool,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
            quota_exhausted,
        }
    }

    /// Creates an invalid locator error.
    pub fn invalid_locator(locator: impl Into<String>) -> Self {
        Self::InvalidLocator {
            locator: locator.into(),
        }
    }

    /// Creates a rate-limit exhaustion error.
    pub fn rate_limited(url: impl Into<String>, waits: u32) -> Self {
        Self::RateLimited {
            url: url.into(),
            waits,
        }
    }
}

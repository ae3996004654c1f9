//! HTTP access to the recipe catalog: searches and recipe file fetches.
//!
//! Every request goes through the same policy:
//! 1. Per-host politeness delay ([`RateLimiter::acquire`])
//! 2. Bounded fixed-delay retries for transient failures ([`RetryPolicy`])
//! 3. Rate-limit waits (429, or 403 with an exhausted quota) that repeat the
//!    same attempt without consuming it, bounded separately
//!
//! Searches never fail: once retries are exhausted the failure is logged and
//! an empty (or partial, for later pages) result is returned. Fetches return
//! a typed [`CatalogError`].

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use regex::Regex;
use reqwest::Client;
use reqwest::header::{HeaderMap, LINK, RETRY_AFTER};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::CatalogError;
use super::rate_limiter::{RateLimiter, parse_retry_after, quota_wait};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use crate::config::{CatalogFormat, ResolutionConfig};
use crate::user_agent;

const RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATELIMIT_RESET: &str = "x-ratelimit-reset";

#[allow(clippy::expect_used)]
static NEXT_LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<([^>]*)>\s*;[^,<]*\brel\s*=\s*"?next"?"#).expect("link regex is valid") // Static pattern, safe to panic
});

/// Raw catalog response bodies for one query, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResults {
    /// Format every page is encoded in.
    pub format: CatalogFormat,
    /// Response bodies, first page first.
    pub pages: Vec<String>,
}

impl RawResults {
    /// A result set with no pages.
    #[must_use]
    pub fn empty(format: CatalogFormat) -> Self {
        Self {
            format,
            pages: Vec::new(),
        }
    }

    /// Returns true when no page was retrieved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

/// One successful response.
#[derive(Debug)]
struct Page {
    body: String,
    next: Option<String>,
    quota_wait: Option<Duration>,
}

/// Catalog HTTP client with retry, politeness, and rate-limit handling.
#[derive(Debug)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
    format: CatalogFormat,
    retry: RetryPolicy,
    limiter: RateLimiter,
    quota_floor: u64,
    max_pages: u32,
}

impl CatalogClient {
    /// Builds a client from the resolution policy.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidLocator`] if the catalog URL is not an
    /// absolute URL, or [`CatalogError::ClientBuild`] if the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ResolutionConfig) -> Result<Self, CatalogError> {
        let base = Url::parse(config.catalog_url.trim())
            .map_err(|_| CatalogError::invalid_locator(config.catalog_url.clone()))?;
        let mut base_url = base.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|source| CatalogError::ClientBuild { source })?;

        debug!(base_url = %base_url, format = ?config.catalog_format, "catalog client ready");
        Ok(Self {
            client,
            base_url,
            format: config.catalog_format,
            retry: RetryPolicy::new(config.max_attempts, config.retry_delay),
            limiter: RateLimiter::new(config.politeness_delay),
            quota_floor: config.quota_floor,
            max_pages: config.max_pages.max(1),
        })
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Format of the responses this client returns.
    #[must_use]
    pub fn format(&self) -> CatalogFormat {
        self.format
    }

    /// Builds the first-page URL for a query.
    #[must_use]
    pub fn search_url(&self, query: &str, type_filter: Option<&str>) -> String {
        let query = urlencoding::encode(query.trim());
        let mut url = match self.format {
            CatalogFormat::Web => format!("{}?search={query}", self.base_url),
            CatalogFormat::Index => format!("{}search?q={query}", self.base_url),
        };
        if let Some(filter) = type_filter.map(str::trim).filter(|f| !f.is_empty()) {
            url.push_str("&type=");
            url.push_str(&urlencoding::encode(filter));
        }
        url
    }

    /// Runs a search, following continuation links.
    ///
    /// Returns every retrieved page; an empty result when the first page
    /// could not be retrieved.
    #[instrument(skip(self), fields(format = ?self.format))]
    pub async fn search(&self, query: &str, type_filter: Option<&str>) -> RawResults {
        let mut results = RawResults::empty(self.format);
        let mut seen = HashSet::new();
        let mut next = Some(self.search_url(query, type_filter));

        while let Some(url) = next.take() {
            if results.pages.len() >= self.max_pages as usize {
                warn!(query, max_pages = self.max_pages, "page limit reached, stopping pagination");
                break;
            }
            if !seen.insert(url.clone()) {
                debug!(url = %url, "continuation link repeats, stopping pagination");
                break;
            }

            match self.get_with_retry(&url).await {
                Ok(page) => {
                    results.pages.push(page.body);
                    next = page.next;
                    if let (Some(wait), true) = (page.quota_wait, next.is_some()) {
                        info!(
                            wait_secs = wait.as_secs(),
                            "request quota at floor, waiting for reset"
                        );
                        self.limiter.record_server_wait(&url, wait);
                        tokio::time::sleep(wait).await;
                    }
                }
                Err(error) => {
                    warn!(
                        query,
                        url = %url,
                        pages = results.pages.len(),
                        error = %error,
                        "retrieval failure: catalog search gave up"
                    );
                    break;
                }
            }
        }

        debug!(query, pages = results.pages.len(), "search complete");
        results
    }

    /// Fetches the text of one recipe file.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the locator is invalid or every attempt failed.
    #[instrument(skip(self))]
    pub async fn fetch(&self, locator: &str) -> Result<String, CatalogError> {
        let url = self.resolve_locator(locator)?;
        let page = self.get_with_retry(&url).await?;
        Ok(page.body)
    }

    /// Resolves a locator to a fetchable URL.
    ///
    /// Absolute URLs are used as-is (GitHub `blob` pages become raw-content
    /// URLs); relative paths are resolved against the catalog base URL.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidLocator`] for empty or unresolvable locators.
    pub fn resolve_locator(&self, locator: &str) -> Result<String, CatalogError> {
        let locator = locator.trim();
        if locator.is_empty() {
            return Err(CatalogError::invalid_locator(locator));
        }
        let url = match Url::parse(locator) {
            Ok(url) => url,
            Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&self.base_url)
                .and_then(|base| base.join(locator.trim_start_matches('/')))
                .map_err(|_| CatalogError::invalid_locator(locator))?,
            Err(_) => return Err(CatalogError::invalid_locator(locator)),
        };
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CatalogError::invalid_locator(locator));
        }
        Ok(rewrite_github_blob(&url))
    }

    async fn get_with_retry(&self, url: &str) -> Result<Page, CatalogError> {
        let mut attempt = 1;
        let mut waits = 0;
        loop {
            self.limiter.acquire(url).await;
            let error = match self.send(url).await {
                Ok(page) => return Ok(page),
                Err(error) => error,
            };

            let failure_type = classify_error(&error);
            if failure_type == FailureType::RateLimited {
                if waits >= self.retry.max_rate_limit_waits() {
                    warn!(url, waits, "rate limit persists, giving up");
                    return Err(CatalogError::rate_limited(url, waits));
                }
                waits += 1;
                let wait = server_wait(&error).unwrap_or(self.retry.delay());
                warn!(url, wait_secs = wait.as_secs_f64(), waits, "rate limited, backing off");
                self.limiter.record_server_wait(url, wait);
                tokio::time::sleep(wait).await;
                continue;
            }

            match self.retry.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        url,
                        attempt,
                        error = %error,
                        delay_ms = delay.as_millis(),
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url, attempt, reason, "not retrying");
                    return Err(error);
                }
            }
        }
    }

    async fn send(&self, url: &str) -> Result<Page, CatalogError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::timeout(url)
            } else {
                CatalogError::network(url, e)
            }
        })?;

        let status = response.status();
        let headers = response.headers();
        let remaining = header_value(headers, RATELIMIT_REMAINING);
        let reset = header_value(headers, RATELIMIT_RESET);
        let quota = quota_wait(
            remaining.as_deref(),
            reset.as_deref(),
            SystemTime::now(),
            self.quota_floor,
        );

        if !status.is_success() {
            let quota_exhausted = remaining
                .as_deref()
                .and_then(|r| r.trim().parse::<u64>().ok())
                == Some(0);
            let retry_after = header_value(headers, RETRY_AFTER.as_str())
                .or_else(|| quota.map(|wait| wait.as_secs().to_string()));
            return Err(CatalogError::http_status_with_hints(
                url,
                status.as_u16(),
                retry_after,
                quota_exhausted,
            ));
        }

        let next = next_link(headers, url);
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                CatalogError::timeout(url)
            } else {
                CatalogError::network(url, e)
            }
        })?;

        Ok(Page {
            body,
            next,
            quota_wait: quota,
        })
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn server_wait(error: &CatalogError) -> Option<Duration> {
    match error {
        CatalogError::HttpStatus {
            retry_after: Some(value),
            ..
        } => parse_retry_after(value),
        _ => None,
    }
}

/// Extracts the `rel="next"` target from a `Link` header, resolved against `current`.
fn next_link(headers: &HeaderMap, current: &str) -> Option<String> {
    headers.get_all(LINK).iter().find_map(|value| {
        let value = value.to_str().ok()?;
        let target = NEXT_LINK_PATTERN.captures(value)?.get(1)?.as_str().trim();
        Url::parse(current)
            .ok()?
            .join(target)
            .ok()
            .map(|url| url.to_string())
    })
}

/// Rewrites `https://github.com/<owner>/<repo>/blob/<ref>/<path>` to its raw-content URL.
#[must_use]
pub fn rewrite_github_blob(url: &Url) -> String {
    if url.host_str() == Some("github.com") && url.path().contains("/blob/") {
        let path = url.path().replacen("/blob/", "/", 1);
        let mut raw = format!("https://raw.githubusercontent.com{path}");
        if let Some(query) = url.query() {
            raw.push('?');
            raw.push_str(query);
        }
        return raw;
    }
    url.to_string()
}

//! Per-host politeness delays and server rate-limit header handling.
//!
//! [`RateLimiter::acquire`] is called before every catalog request. The first
//! request to a host proceeds immediately; later requests to the same host
//! wait until at least the configured delay has passed since the previous
//! request started, whatever that request's outcome was.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Cumulative delay per host above which a warning is logged.
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(60);

/// Upper bound for any server-mandated wait.
pub const MAX_SERVER_WAIT: Duration = Duration::from_secs(3600);

/// Per-host politeness limiter.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    disabled: bool,
    /// Arc lets callers drop the map guard before awaiting the inner mutex.
    hosts: DashMap<String, Arc<HostState>>,
}

#[derive(Debug)]
struct HostState {
    /// `None` until the first request to this host.
    last_request: Mutex<Option<Instant>>,
    cumulative_delay_ms: AtomicU64,
}

impl HostState {
    fn new() -> Self {
        Self {
            last_request: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(total)
    }
}

impl RateLimiter {
    /// Creates a limiter enforcing `delay` between requests to the same host.
    /// A zero delay disables it.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        if delay.is_zero() {
            return Self::disabled();
        }
        debug!(delay_ms = delay.as_millis(), "creating politeness limiter");
        Self {
            delay,
            disabled: false,
            hosts: DashMap::new(),
        }
    }

    /// Creates a limiter that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            delay: Duration::ZERO,
            disabled: true,
            hosts: DashMap::new(),
        }
    }

    /// Returns whether the limiter is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the per-host delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits until a request to `url`'s host is allowed, then marks it as started.
    #[instrument(skip(self), fields(host))]
    pub async fn acquire(&self, url: &str) {
        if self.disabled {
            return;
        }

        let host = extract_host(url);
        tracing::Span::current().record("host", host.as_str());

        let state = self
            .hosts
            .entry(host.clone())
            .or_insert_with(|| Arc::new(HostState::new()))
            .clone();

        let mut last_request = state.last_request.lock().await;
        if let Some(previous) = *last_request {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay.saturating_sub(elapsed);
                let cumulative = state.add_cumulative_delay(wait);
                debug!(
                    host = %host,
                    delay_ms = wait.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "applying politeness delay"
                );
                tokio::time::sleep(wait).await;
            }
        }
        *last_request = Some(Instant::now());
    }

    /// Records a server-mandated wait for `url`'s host.
    pub fn record_server_wait(&self, url: &str, wait: Duration) {
        let host = extract_host(url);
        let state = self
            .hosts
            .entry(host.clone())
            .or_insert_with(|| Arc::new(HostState::new()))
            .clone();
        let cumulative = state.add_cumulative_delay(wait);
        if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
            warn!(
                host = %host,
                cumulative_delay_secs = cumulative.as_secs(),
                "excessive server rate limiting"
            );
        }
    }
}

/// Extracts the lowercase host from a URL, `"unknown"` when unparseable.
#[must_use]
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a `Retry-After` header (integer seconds or HTTP-date), capped at one hour.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        };
        return Some(Duration::from_secs(seconds).min(MAX_SERVER_WAIT));
    }

    match httpdate::parse_http_date(header_value) {
        Ok(when) => Some(
            when.duration_since(SystemTime::now())
                .unwrap_or(Duration::ZERO)
                .min(MAX_SERVER_WAIT),
        ),
        Err(_) => {
            debug!(header_value, "unparseable Retry-After value");
            None
        }
    }
}

/// Wait required before the next page given quota headers.
///
/// `remaining` and `reset_epoch_secs` are the raw `x-ratelimit-remaining` and
/// `x-ratelimit-reset` values. Returns `None` while the quota is above
/// `floor`, otherwise the time until reset capped at one hour.
#[must_use]
pub fn quota_wait(
    remaining: Option<&str>,
    reset_epoch_secs: Option<&str>,
    now: SystemTime,
    floor: u64,
) -> Option<Duration> {
    let remaining = remaining?.trim().parse::<u64>().ok()?;
    if remaining > floor {
        return None;
    }
    let now_secs = now.duration_since(UNIX_EPOCH).ok()?.as_secs();
    let wait = reset_epoch_secs
        .and_then(|reset| reset.trim().parse::<u64>().ok())
        .map_or(Duration::ZERO, |reset| {
            Duration::from_secs(reset.saturating_sub(now_secs))
        });
    Some(wait.min(MAX_SERVER_WAIT))
}

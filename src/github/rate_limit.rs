// Rate limit tracking from GitHub response headers.
// Written only by the request queue's worker, one completed call at a time.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;

use crate::clock::Clock;
use crate::error::{HubError, Result};

/// Assumed quota before the first real response (unauthenticated GitHub limit).
pub const DEFAULT_REMAINING: u64 = 60;

/// Shortest pause taken once the quota is exhausted.
pub const MIN_WAIT: Duration = Duration::from_secs(1);

const HEADER_LIMIT: &str = "x-ratelimit-limit";
const HEADER_REMAINING: &str = "x-ratelimit-remaining";
const HEADER_RESET: &str = "x-ratelimit-reset";

/// Rate limit information as last reported by upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitState {
    pub limit: Option<u64>,
    pub remaining: u64,
    pub reset_at: Option<DateTime<Utc>>,
}

impl Default for RateLimitState {
    fn default() -> Self {
        Self {
            limit: None,
            remaining: DEFAULT_REMAINING,
            reset_at: None,
        }
    }
}

pub struct RateLimitTracker {
    state: Mutex<RateLimitState>,
    clock: Arc<dyn Clock>,
    min_wait: Duration,
    wait_enabled: bool,
}

fn header_number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

impl RateLimitTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_options(clock, DEFAULT_REMAINING, MIN_WAIT, true)
    }

    /// `wait_enabled = false` makes an exhausted quota fail with
    /// [`HubError::RateLimited`] instead of sleeping.
    pub fn with_options(
        clock: Arc<dyn Clock>,
        initial_remaining: u64,
        min_wait: Duration,
        wait_enabled: bool,
    ) -> Self {
        Self {
            state: Mutex::new(RateLimitState {
                remaining: initial_remaining,
                ..RateLimitState::default()
            }),
            clock,
            min_wait,
            wait_enabled,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RateLimitState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn snapshot(&self) -> RateLimitState {
        *self.lock()
    }

    /// Update from response headers. Missing or unparsable headers leave state unchanged.
    pub fn record_headers(&self, headers: &HeaderMap) {
        let mut state = self.lock();

        if let Some(limit) = header_number(headers, HEADER_LIMIT) {
            state.limit = Some(limit);
        }

        if let Some(remaining) = header_number(headers, HEADER_REMAINING) {
            state.remaining = remaining;
        }

        if let Some(reset) = header_number::<i64>(headers, HEADER_RESET) {
            if let Some(reset_at) = DateTime::from_timestamp(reset, 0) {
                state.reset_at = Some(reset_at);
            }
        }

        tracing::trace!(remaining = state.remaining, reset_at = ?state.reset_at, "Rate limit updated");
    }

    /// Overwrite the state directly, e.g. from the `/rate_limit` endpoint.
    pub fn update(&self, limit: Option<u64>, remaining: u64, reset_at: Option<DateTime<Utc>>) {
        let mut state = self.lock();
        if limit.is_some() {
            state.limit = limit;
        }
        state.remaining = remaining;
        state.reset_at = reset_at;
    }

    /// How long a caller must pause before the next request, if at all.
    pub fn wait_duration(&self) -> Option<Duration> {
        let state = self.snapshot();
        if state.remaining > 0 {
            return None;
        }

        let until_reset = state
            .reset_at
            .and_then(|reset_at| reset_at.signed_duration_since(self.clock.now()).to_std().ok())
            .unwrap_or(Duration::ZERO);

        Some(until_reset.max(self.min_wait))
    }

    /// Return once a request may be made.
    ///
    /// With the quota exhausted this sleeps until the reported reset and then
    /// assumes the window has rolled over; the next response corrects the state.
    pub async fn await_permission(&self) -> Result<()> {
        let Some(wait) = self.wait_duration() else {
            return Ok(());
        };

        if !self.wait_enabled {
            let reset_at = self
                .snapshot()
                .reset_at
                .unwrap_or_else(|| {
                    self.clock.now()
                        + chrono::Duration::from_std(wait).unwrap_or(chrono::Duration::zero())
                });
            return Err(HubError::RateLimited { reset_at });
        }

        tracing::info!(wait_secs = wait.as_secs_f64(), "Rate limit exhausted, waiting for reset");
        tokio::time::sleep(wait).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use reqwest::header::HeaderValue;

    fn tracker() -> (Arc<ManualClock>, RateLimitTracker) {
        let clock = Arc::new(ManualClock::default());
        (clock.clone(), RateLimitTracker::new(clock))
    }

    #[test]
    fn test_defaults() {
        let (_, tracker) = tracker();
        let state = tracker.snapshot();
        assert_eq!(state.remaining, DEFAULT_REMAINING);
        assert_eq!(state.reset_at, None);
        assert_eq!(tracker.wait_duration(), None);
    }

    #[test]
    fn test_record_headers() {
        let (_, tracker) = tracker();
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4999"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        tracker.record_headers(&headers);

        let state = tracker.snapshot();
        assert_eq!(state.limit, Some(5000));
        assert_eq!(state.remaining, 4999);
        assert_eq!(state.reset_at.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_missing_headers_keep_state() {
        let (_, tracker) = tracker();
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("12"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));
        tracker.record_headers(&headers);

        let mut partial = HeaderMap::new();
        partial.insert("x-ratelimit-remaining", HeaderValue::from_static("not-a-number"));
        tracker.record_headers(&partial);
        tracker.record_headers(&HeaderMap::new());

        let state = tracker.snapshot();
        assert_eq!(state.remaining, 12);
        assert_eq!(state.reset_at.unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_wait_duration_has_floor() {
        let (clock, tracker) = tracker();

        // Reset already passed
        tracker.update(None, 0, Some(clock.now() - chrono::Duration::seconds(30)));
        assert_eq!(tracker.wait_duration(), Some(MIN_WAIT));

        // Reset unknown
        tracker.update(None, 0, None);
        assert_eq!(tracker.wait_duration(), Some(MIN_WAIT));

        tracker.update(None, 0, Some(clock.now() + chrono::Duration::seconds(10)));
        assert_eq!(tracker.wait_duration(), Some(Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_permission_waits_until_reset() {
        let (clock, tracker) = tracker();
        tracker.update(None, 0, Some(clock.now() + chrono::Duration::seconds(2)));

        let start = tokio::time::Instant::now();
        tracker.await_permission().await.unwrap();
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_await_permission_returns_immediately_with_quota() {
        let (_, tracker) = tracker();

        let start = tokio::time::Instant::now();
        tracker.await_permission().await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_fail_fast_when_waiting_disabled() {
        let clock = Arc::new(ManualClock::default());
        let tracker = RateLimitTracker::with_options(clock.clone(), 0, MIN_WAIT, false);
        let reset_at = clock.now() + chrono::Duration::seconds(60);
        tracker.update(None, 0, Some(reset_at));

        let err = tracker.await_permission().await.unwrap_err();
        assert!(matches!(err, HubError::RateLimited { reset_at: r } if r == reset_at));
    }
}

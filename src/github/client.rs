// GitHub API client.
// Wires the cache, request queue and rate limit tracker around an HTTP transport.

use std::sync::Arc;

use reqwest::{
    StatusCode, Url,
    header::{AUTHORIZATION, HeaderMap, HeaderValue},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::cache::{CacheKey, CacheStore, DEFAULT_TTL, MemoryPersistence};
use crate::clock::{Clock, SystemClock};
use crate::error::{HubError, Result};

use super::queue::RequestQueue;
use super::rate_limit::RateLimitTracker;
use super::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

pub const GITHUB_API_BASE: &str = "https://api.github.com";
pub const DEFAULT_PER_PAGE: u32 = 10;
pub const DEFAULT_USER_AGENT: &str = "hubscout";

/// Supplies the bearer token attached to each upstream call.
pub trait CredentialProvider: Send + Sync {
    fn token(&self) -> Result<String>;
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl CredentialProvider for StaticToken {
    fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvToken {
    fn default() -> Self {
        Self::new("GITHUB_TOKEN")
    }
}

impl CredentialProvider for EnvToken {
    fn token(&self) -> Result<String> {
        std::env::var(&self.var).map_err(|_| HubError::MissingToken)
    }
}

pub(crate) struct ClientInner {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialProvider>,
    pub(crate) cache: CacheStore,
    pub(crate) rate_limit: RateLimitTracker,
    queue: RequestQueue,
    base_url: Url,
    pub(crate) per_page: u32,
}

/// GitHub API client with queueing, caching and rate limit tracking.
///
/// Cheap to clone; clones share the same cache, queue and rate limit state.
#[derive(Clone)]
pub struct GithubClient {
    pub(crate) inner: Arc<ClientInner>,
}

/// Builder for [`GithubClient`]. Unset collaborators get in-memory defaults.
pub struct GithubClientBuilder {
    credentials: Arc<dyn CredentialProvider>,
    transport: Option<Arc<dyn HttpTransport>>,
    cache: Option<CacheStore>,
    rate_limit: Option<RateLimitTracker>,
    clock: Arc<dyn Clock>,
    base_url: String,
    per_page: u32,
    user_agent: String,
}

impl GithubClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn cache(mut self, cache: CacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn rate_limit(mut self, tracker: RateLimitTracker) -> Self {
        self.rate_limit = Some(tracker);
        self
    }

    /// Clock used by the default cache and rate limit tracker.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<GithubClient> {
        let base_url = Url::parse(&self.base_url)
            .map_err(|e| HubError::Config(format!("invalid API base '{}': {e}", self.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(HubError::Config(format!(
                "invalid API base '{}'",
                self.base_url
            )));
        }

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.user_agent)?),
        };
        let cache = self.cache.unwrap_or_else(|| {
            CacheStore::new(
                DEFAULT_TTL,
                Arc::clone(&self.clock),
                Box::new(MemoryPersistence),
            )
        });
        let rate_limit = self
            .rate_limit
            .unwrap_or_else(|| RateLimitTracker::new(Arc::clone(&self.clock)));

        Ok(GithubClient {
            inner: Arc::new(ClientInner {
                transport,
                credentials: self.credentials,
                cache,
                rate_limit,
                queue: RequestQueue::new(),
                base_url,
                per_page: self.per_page.clamp(1, 100),
            }),
        })
    }
}

impl GithubClient {
    pub fn builder(credentials: Arc<dyn CredentialProvider>) -> GithubClientBuilder {
        GithubClientBuilder {
            credentials,
            transport: None,
            cache: None,
            rate_limit: None,
            clock: Arc::new(SystemClock),
            base_url: GITHUB_API_BASE.to_string(),
            per_page: DEFAULT_PER_PAGE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Create a client with the given token and default collaborators.
    pub fn new(token: &str) -> Result<Self> {
        Self::builder(Arc::new(StaticToken::new(token))).build()
    }

    /// Create a client from the GITHUB_TOKEN environment variable.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN").map_err(|_| HubError::MissingToken)?;
        Self::new(&token)
    }

    pub fn cache(&self) -> &CacheStore {
        &self.inner.cache
    }

    /// Build an API URL from path segments (each percent-encoded) and query pairs.
    pub(crate) fn url(&self, segments: &[&str], params: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| HubError::Config("API base cannot be a base URL".to_string()))?
            .pop_if_empty()
            .extend(segments);

        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// Return a fresh cached value or queue a fetch for it.
    ///
    /// `extract` turns the raw upstream payload into the cached result.
    pub(crate) async fn cached_fetch<R, T, F>(&self, key: CacheKey, url: Url, extract: F) -> Result<T>
    where
        R: DeserializeOwned + Send + 'static,
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce(R) -> T + Send + 'static,
    {
        if let Some(hit) = self.inner.cache.get::<T>(&key) {
            tracing::debug!(key = %key, "Cache hit");
            return Ok(hit);
        }
        tracing::debug!(key = %key, "Cache miss");

        let inner = Arc::clone(&self.inner);
        self.inner
            .queue
            .enqueue(move || async move {
                let raw: R = inner.fetch(url).await?;
                let value = extract(raw);
                inner.cache.set(&key, &value)?;
                Ok(value)
            })
            .await
    }

    /// Queue an uncached fetch.
    ///
    /// `then` runs on the queue worker right after the response arrives, so any
    /// state it writes is ordered with every other upstream call.
    pub(crate) async fn queued_fetch_with<R, T, F>(&self, url: Url, then: F) -> Result<T>
    where
        R: DeserializeOwned + Send + 'static,
        T: Send + 'static,
        F: FnOnce(&ClientInner, R) -> T + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        self.inner
            .queue
            .enqueue(move || async move {
                let raw: R = inner.fetch(url).await?;
                Ok(then(&inner, raw))
            })
            .await
    }
}

impl ClientInner {
    /// Perform one authenticated GET. Only ever called from the queue worker.
    async fn fetch<R: DeserializeOwned>(&self, url: Url) -> Result<R> {
        self.rate_limit.await_permission().await?;

        let token = self.credentials.token()?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| HubError::Config(e.to_string()))?,
        );

        tracing::debug!(url = %url, "GET");
        let response = self
            .transport
            .get(HttpRequest {
                url: url.clone(),
                headers,
            })
            .await?;

        self.rate_limit.record_headers(&response.headers);
        self.check_response(&url, &response)?;

        serde_json::from_slice(&response.body)
            .map_err(|e| HubError::MalformedResponse(format!("{}: {}", url.path(), e)))
    }

    /// Check response status and convert errors.
    fn check_response(&self, url: &Url, response: &HttpResponse) -> Result<()> {
        let status = response.status;
        if status.is_success() {
            return Ok(());
        }

        match status {
            StatusCode::UNAUTHORIZED => Err(HubError::Unauthorized),
            StatusCode::NOT_FOUND => Err(HubError::NotFound(url.to_string())),
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
                if self.rate_limit.snapshot().remaining == 0 =>
            {
                let reset_at = self
                    .rate_limit
                    .snapshot()
                    .reset_at
                    .unwrap_or_else(chrono::Utc::now);
                tracing::warn!(%reset_at, "Upstream rejected request: rate limited");
                Err(HubError::RateLimited { reset_at })
            }
            status => {
                let message = upstream_message(&response.body).unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("Unknown error").to_string()
                });
                tracing::warn!(status = status.as_u16(), %message, "Upstream error");
                Err(HubError::Upstream {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

/// The `message` field GitHub puts in error bodies.
fn upstream_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_bad_base_url() {
        let result = GithubClient::builder(Arc::new(StaticToken::new("t")))
            .base_url("not a url")
            .build();
        assert!(matches!(result, Err(HubError::Config(_))));

        let result = GithubClient::builder(Arc::new(StaticToken::new("t")))
            .base_url("mailto:someone@example.com")
            .build();
        assert!(matches!(result, Err(HubError::Config(_))));
    }

    #[test]
    fn test_url_building() {
        let client = GithubClient::builder(Arc::new(StaticToken::new("t")))
            .base_url("https://ghe.example.com/api/v3/")
            .build()
            .unwrap();

        let url = client
            .url(&["users", "octo/cat", "repos"], &[("sort", "created")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/users/octo%2Fcat/repos?sort=created"
        );
    }

    #[test]
    fn test_per_page_is_clamped() {
        let client = GithubClient::builder(Arc::new(StaticToken::new("t")))
            .per_page(1000)
            .build()
            .unwrap();
        assert_eq!(client.inner.per_page, 100);
    }

    #[test]
    fn test_upstream_message() {
        assert_eq!(
            upstream_message(br#"{"message":"Validation Failed"}"#),
            Some("Validation Failed".to_string())
        );
        assert_eq!(upstream_message(b"<html>"), None);
        assert_eq!(upstream_message(br#"{"error":"x"}"#), None);
    }

    #[test]
    fn test_env_token_missing() {
        let provider = EnvToken::new("HUBSCOUT_TEST_TOKEN_THAT_IS_NEVER_SET");
        assert!(matches!(provider.token(), Err(HubError::MissingToken)));
    }
}

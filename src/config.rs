//! Configuration for hubscout.
//!
//! Settings are layered (later sources override earlier):
//! 1. Built-in defaults
//! 2. User config file (`~/.config/hubscout/config.toml` on Linux)
//! 3. Local config file (`./hubscout.toml`)
//! 4. Environment variables prefixed with `HUBSCOUT_`, using `__` between
//!    sections (e.g. `HUBSCOUT_CACHE__TTL_SECS=600`)
//!
//! The GitHub token falls back to `GITHUB_TOKEN` when not configured.
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "ghp_..."
//! per_page = 10
//!
//! [cache]
//! ttl_secs = 300
//! persist = true
//!
//! [rate_limit]
//! min_wait_ms = 1000
//! wait = true
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::Deserialize;

use crate::cache::{CachePersistence, CacheStore, FilePersistence, MemoryPersistence, paths};
use crate::clock::{Clock, SystemClock};
use crate::error::{HubError, Result};
use crate::github::client::{
    DEFAULT_PER_PAGE, DEFAULT_USER_AGENT, GITHUB_API_BASE, GithubClient, StaticToken,
};
use crate::github::rate_limit::{DEFAULT_REMAINING, RateLimitTracker};

/// Top-level settings.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub github: GitHubSettings,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
}

/// Upstream API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    /// Bearer token. Falls back to GITHUB_TOKEN.
    pub token: Option<String>,
    pub api_base: String,
    /// Page size for listing and search calls (1-100).
    pub per_page: u32,
    pub user_agent: String,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            token: None,
            api_base: GITHUB_API_BASE.to_string(),
            per_page: DEFAULT_PER_PAGE,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub ttl_secs: u64,
    /// Keep the cache on disk across restarts.
    pub persist: bool,
    /// Cache file; defaults to the platform cache directory.
    pub path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            persist: true,
            path: None,
        }
    }
}

/// Rate limit handling.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Quota assumed before the first response arrives.
    pub initial_remaining: u64,
    pub min_wait_ms: u64,
    /// Sleep until reset when exhausted; otherwise fail immediately.
    pub wait: bool,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            initial_remaining: DEFAULT_REMAINING,
            min_wait_ms: 1000,
            wait: true,
        }
    }
}

impl Settings {
    /// Load from the user config file, `./hubscout.toml` and the environment.
    pub fn load() -> Result<Self> {
        let mut files = Vec::new();
        if let Some(path) = paths::config_file_path() {
            files.push(path);
        }
        files.push(PathBuf::from("hubscout.toml"));
        Self::load_from(&files)
    }

    /// Load from the given files (missing ones are skipped) plus the environment.
    pub fn load_from(files: &[PathBuf]) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        for path in files {
            if path.exists() {
                tracing::debug!("Loading config from {:?}", path);
                builder = builder.add_source(
                    File::from(path.as_path())
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("HUBSCOUT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()
            .and_then(|settings| settings.try_deserialize::<Settings>())
            .map_err(|e| HubError::Config(e.to_string()))
    }

    /// Configured token, else GITHUB_TOKEN.
    pub fn token(&self) -> Result<String> {
        self.github
            .token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.is_empty())
            .ok_or(HubError::MissingToken)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_secs)
    }

    /// Where the cache is persisted, if persistence is enabled.
    pub fn cache_path(&self) -> Option<PathBuf> {
        if !self.cache.persist {
            return None;
        }
        self.cache.path.clone().or_else(paths::cache_file_path)
    }

    fn persistence(&self) -> Box<dyn CachePersistence> {
        match self.cache_path() {
            Some(path) => Box::new(FilePersistence::new(path)),
            None => Box::new(MemoryPersistence),
        }
    }

    /// Open the response cache these settings describe.
    pub fn cache_store(&self, clock: Arc<dyn Clock>) -> CacheStore {
        CacheStore::new(self.ttl(), clock, self.persistence())
    }

    /// Build a client wired according to these settings.
    pub fn build_client(&self) -> Result<GithubClient> {
        let token = self.token()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let cache = self.cache_store(Arc::clone(&clock));
        let rate_limit = RateLimitTracker::with_options(
            Arc::clone(&clock),
            self.rate_limit.initial_remaining,
            Duration::from_millis(self.rate_limit.min_wait_ms),
            self.rate_limit.wait,
        );

        GithubClient::builder(Arc::new(StaticToken::new(token)))
            .clock(clock)
            .cache(cache)
            .rate_limit(rate_limit)
            .base_url(&self.github.api_base)
            .per_page(self.github.per_page)
            .user_agent(&self.github.user_agent)
            .build()
    }
}

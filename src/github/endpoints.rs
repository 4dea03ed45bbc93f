// GitHub API endpoint functions.
// Each operation validates its input, consults the cache, and otherwise queues a fetch.

use crate::cache::{CacheKey, Namespace};
use crate::error::{HubError, Result};
use crate::languages::Language;

use super::client::GithubClient;
use super::rate_limit::RateLimitState;
use super::types::{
    LanguageBreakdown, RateLimitResource, RateLimitResponse, RepositoryList, SearchResponse,
    UserProfile,
};

fn require_username(username: &str) -> Result<&str> {
    let username = username.trim();
    if username.is_empty() {
        return Err(HubError::InvalidInput("username must not be empty".to_string()));
    }
    Ok(username)
}

/// Split `owner/repo`, rejecting anything else.
fn split_full_name(full_name: &str) -> Result<(&str, &str)> {
    match full_name.trim().split_once('/') {
        Some((owner, repo))
            if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
        {
            Ok((owner, repo))
        }
        _ => Err(HubError::InvalidInput(format!(
            "expected 'owner/repo', got '{}'",
            full_name
        ))),
    }
}

impl GithubClient {
    /// Most-starred repositories for a language.
    pub async fn get_repositories_by_language(&self, language: &str) -> Result<RepositoryList> {
        let language = Language::parse(language)?;
        let per_page = self.inner.per_page.to_string();
        let query = format!("language:{}", language);

        let url = self.url(
            &["search", "repositories"],
            &[
                ("q", query.as_str()),
                ("sort", "stars"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
            ],
        )?;

        let key = CacheKey::new(Namespace::ReposByLanguage, language.as_str());
        self.cached_fetch(key, url, |response: SearchResponse| response.items)
            .await
    }

    /// Public profile of a user.
    pub async fn get_user(&self, username: &str) -> Result<UserProfile> {
        let username = require_username(username)?;
        let url = self.url(&["users", username], &[])?;

        let key = CacheKey::new(Namespace::Users, username.to_lowercase());
        self.cached_fetch(key, url, |profile: UserProfile| profile)
            .await
    }

    /// A user's repositories, newest first.
    pub async fn get_user_repositories(&self, username: &str) -> Result<RepositoryList> {
        let username = require_username(username)?;
        let per_page = self.inner.per_page.to_string();
        let url = self.url(
            &["users", username, "repos"],
            &[("sort", "created"), ("per_page", per_page.as_str())],
        )?;

        let key = CacheKey::new(Namespace::ReposByUser, username.to_lowercase());
        self.cached_fetch(key, url, |repos: RepositoryList| repos)
            .await
    }

    /// Bytes of code per language for `owner/repo`.
    pub async fn get_repository_languages(&self, full_name: &str) -> Result<LanguageBreakdown> {
        let (owner, repo) = split_full_name(full_name)?;
        let url = self.url(&["repos", owner, repo, "languages"], &[])?;

        let key = CacheKey::new(
            Namespace::Languages,
            format!("{}/{}", owner, repo).to_lowercase(),
        );
        self.cached_fetch(key, url, |breakdown: LanguageBreakdown| breakdown)
            .await
    }

    /// Drop every cached response.
    pub fn clear_cache(&self) {
        tracing::info!("Clearing response cache");
        self.inner.cache.clear();
    }

    /// Rate limit state as tracked from the most recent response.
    pub fn rate_limit(&self) -> RateLimitState {
        self.inner.rate_limit.snapshot()
    }

    /// Ask upstream for the current core quota. Never cached.
    pub async fn rate_limit_status(&self) -> Result<RateLimitResource> {
        let url = self.url(&["rate_limit"], &[])?;
        self.queued_fetch_with(url, |inner, response: RateLimitResponse| {
            let core = response.resources.core;
            inner
                .rate_limit
                .update(Some(core.limit), core.remaining, core.reset_at());
            core
        })
        .await
    }
}

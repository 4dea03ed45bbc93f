// GitHub API response types.
// Typed results for each operation; anything that does not fit is a malformed response.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Repository owner as embedded in repository payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    pub avatar_url: Option<String>,
    pub html_url: Option<String>,
}

/// Repository summary shown in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    #[serde(alias = "stargazers_count")]
    pub stars: u64,
    pub forks: u64,
    pub language: Option<String>,
    pub html_url: String,
    pub owner: Owner,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Ordered list of repositories, as ranked upstream.
pub type RepositoryList = Vec<RepositorySummary>;

/// Public user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: String,
    pub bio: Option<String>,
    pub followers: u64,
    pub following: u64,
    pub public_repos: u64,
    pub html_url: String,
    #[serde(default)]
    pub repos_url: Option<String>,
    #[serde(default)]
    pub blog: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Bytes of code per language in a repository.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageBreakdown(pub BTreeMap<String, u64>);

impl LanguageBreakdown {
    pub fn total_bytes(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn bytes(&self, language: &str) -> Option<u64> {
        self.0.get(language).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Languages with their share of the total (0-100), largest first.
    pub fn percentages(&self) -> Vec<(String, f64)> {
        let total = self.total_bytes();
        if total == 0 {
            return Vec::new();
        }

        let mut shares: Vec<(String, f64)> = self
            .0
            .iter()
            .map(|(lang, bytes)| (lang.clone(), *bytes as f64 * 100.0 / total as f64))
            .collect();
        shares.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        shares
    }

    /// The language with the most bytes.
    pub fn primary(&self) -> Option<&str> {
        self.0
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(lang, _)| lang.as_str())
    }
}

/// Search endpoint wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,
    pub items: Vec<RepositorySummary>,
}

/// One quota bucket from the `/rate_limit` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitResource {
    pub limit: u64,
    pub remaining: u64,
    pub reset: i64,
    #[serde(default)]
    pub used: u64,
}

impl RateLimitResource {
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.reset, 0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RateLimitResources {
    pub core: RateLimitResource,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RateLimitResponse {
    pub resources: RateLimitResources,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repository_from_upstream_shape() {
        let repo: RepositorySummary = serde_json::from_value(json!({
            "id": 81598961,
            "name": "cpython",
            "full_name": "python/cpython",
            "description": "The Python programming language",
            "stargazers_count": 50000,
            "watchers_count": 50000,
            "forks": 28000,
            "forks_count": 28000,
            "language": "Python",
            "html_url": "https://github.com/python/cpython",
            "owner": {"login": "python", "id": 1525981, "avatar_url": null, "html_url": "https://github.com/python"},
            "created_at": "2017-02-10T19:23:51Z",
            "updated_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert_eq!(repo.name, "cpython");
        assert_eq!(repo.stars, 50000);
        assert_eq!(repo.forks, 28000);
        assert_eq!(repo.owner.login, "python");

        // Cached form round-trips through the renamed field
        let cached = serde_json::to_value(&repo).unwrap();
        assert_eq!(cached["stars"], 50000);
        let back: RepositorySummary = serde_json::from_value(cached).unwrap();
        assert_eq!(back, repo);
    }

    #[test]
    fn test_missing_counts_are_rejected() {
        let repo = serde_json::from_value::<RepositorySummary>(json!({
            "name": "cpython",
            "full_name": "python/cpython",
            "description": null,
            "forks": 1,
            "language": "Python",
            "html_url": "https://github.com/python/cpython",
            "owner": {"login": "python", "avatar_url": null, "html_url": null}
        }));
        assert!(repo.is_err());

        let profile = serde_json::from_value::<UserProfile>(json!({
            "login": "octocat",
            "name": null,
            "avatar_url": "https://avatars.githubusercontent.com/u/583231",
            "bio": null,
            "followers": 1,
            "following": 2,
            "html_url": "https://github.com/octocat"
        }));
        assert!(profile.is_err());
    }

    #[test]
    fn test_search_response_requires_items() {
        let err = serde_json::from_value::<SearchResponse>(json!({"total_count": 0}));
        assert!(err.is_err());
    }

    #[test]
    fn test_language_breakdown() {
        let breakdown: LanguageBreakdown =
            serde_json::from_value(json!({"Rust": 750, "Shell": 50, "Python": 200})).unwrap();

        assert_eq!(breakdown.total_bytes(), 1000);
        assert_eq!(breakdown.bytes("Python"), Some(200));
        assert_eq!(breakdown.primary(), Some("Rust"));

        let shares = breakdown.percentages();
        assert_eq!(shares[0].0, "Rust");
        assert!((shares[0].1 - 75.0).abs() < f64::EPSILON);
        assert_eq!(shares[2].0, "Shell");

        assert!(LanguageBreakdown::default().percentages().is_empty());
        assert_eq!(LanguageBreakdown::default().primary(), None);
    }

    #[test]
    fn test_rate_limit_resource_reset() {
        let resource = RateLimitResource {
            limit: 5000,
            remaining: 10,
            reset: 1_700_000_000,
            used: 4990,
        };
        assert_eq!(resource.reset_at().unwrap().timestamp(), 1_700_000_000);
    }
}

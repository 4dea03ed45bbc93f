//! Access layer for the GitHub REST API.
//!
//! [`GithubClient`] validates input, answers from a TTL cache when it can, and
//! otherwise pushes the call through a single-file request queue that waits
//! out exhausted rate limits before touching the network.
//!
//! ```no_run
//! # async fn run() -> hubscout::Result<()> {
//! let client = hubscout::GithubClient::from_env()?;
//! let repos = client.get_repositories_by_language("rust").await?;
//! println!("{} stars", repos[0].stars);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod github;
pub mod languages;

pub use config::Settings;
pub use error::{ErrorKind, HubError, Result};
pub use github::{GithubClient, LanguageBreakdown, RepositoryList, RepositorySummary, UserProfile};
pub use languages::{Language, SUPPORTED_LANGUAGES};

// GitHub API module.
// Queued, rate-limit aware and cached access to the GitHub REST API.

pub mod client;
pub mod endpoints;
pub mod queue;
pub mod rate_limit;
pub mod transport;
pub mod types;

pub use client::{CredentialProvider, EnvToken, GithubClient, GithubClientBuilder, StaticToken};
pub use queue::RequestQueue;
pub use rate_limit::{RateLimitState, RateLimitTracker};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use types::*;

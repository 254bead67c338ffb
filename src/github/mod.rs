//! GitHub REST access.
//!
//! Requests flow `RepoClient` → `ConditionalCache` → `OctocrabTransport`:
//!
//! - `RepoClient` maps effects to REST calls for one repository
//! - `ConditionalCache` makes GETs conditional on their last entity tag and
//!   records rate-limit telemetry
//! - `OctocrabTransport` sends the request, categorizes failures and retries
//!   transient errors on reads

mod cache;
mod client;
mod error;
mod interpreter;
mod retry;
mod transport;

pub use cache::{CacheEntry, CacheState, CacheStats, ConditionalCache};
pub use client::OctocrabTransport;
pub use error::{GitHubApiError, GitHubErrorKind};
pub use interpreter::{DEFAULT_API_URL, RepoClient};
pub use retry::{RetryConfig, RetryPolicy, RetryResult, retry_with_backoff};
pub use transport::{
    ApiRequest, ApiResponse, HttpTransport, RATE_LIMIT_REMAINING, RATE_LIMIT_TOTAL,
};

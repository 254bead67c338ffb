//! Effect interpreter trait.
//!
//! The trait seam lets the train run against the real REST client in
//! production and an in-memory fake in tests.

use std::future::Future;

use crate::github::GitHubApiError;

use super::github::{GitHubEffect, GitHubResponse};

/// Interprets GitHub effects against the GitHub API.
///
/// Implementations are constructed with a `RepoId`, so all effects executed
/// through a single interpreter instance are scoped to that repository.
///
/// # Example (mock for testing)
///
/// ```ignore
/// struct Canned(GitHubResponse);
///
/// impl GitHubInterpreter for Canned {
///     async fn interpret(&self, _effect: GitHubEffect) -> Result<GitHubResponse, GitHubApiError> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
pub trait GitHubInterpreter: Send + Sync + 'static {
    /// Execute a GitHub effect and return its response.
    fn interpret(
        &self,
        effect: GitHubEffect,
    ) -> impl Future<Output = Result<GitHubResponse, GitHubApiError>> + Send;
}

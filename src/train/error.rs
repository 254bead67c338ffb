//! Errors that abort a train evaluation.

use thiserror::Error;

use crate::effects::GitHubResponse;
use crate::github::GitHubApiError;

#[derive(Debug, Error)]
pub enum TrainError {
    /// A GitHub request failed.
    #[error(transparent)]
    GitHub(#[from] GitHubApiError),

    /// The interpreter answered an effect with the wrong response variant.
    #[error("expected {expected} response, got {got}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },
}

impl TrainError {
    pub fn unexpected(expected: &'static str, got: &GitHubResponse) -> Self {
        TrainError::UnexpectedResponse {
            expected,
            got: got.kind(),
        }
    }
}

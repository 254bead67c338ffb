//! Typed webhook events.
//!
//! Only the events that drive the train are represented:
//!
//! - `status` - a commit status changed (legacy Status API)
//! - `pull_request` with action `labeled` / `unlabeled`
//! - `ping` - sent when a hook is created; used as a liveness probe

use serde::{Deserialize, Serialize};

use crate::types::{PrNumber, RepoId, Sha, StatusState};

/// A parsed webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainEvent {
    /// A commit status was created or updated.
    ///
    /// The commit can't cheaply be mapped back to the PRs it affects, so the
    /// whole train is re-evaluated.
    Status {
        repo: RepoId,
        sha: Sha,
        state: StatusState,
    },

    /// A label was added to a pull request.
    Labeled {
        repo: RepoId,
        pr: PrNumber,
        label: String,
    },

    /// A label was removed from a pull request.
    Unlabeled {
        repo: RepoId,
        pr: PrNumber,
        label: String,
    },

    /// The hook was pinged. Organization hooks have no repository.
    Ping { repo: Option<RepoId> },
}

impl TrainEvent {
    /// Returns the repository this event belongs to.
    pub fn repo(&self) -> Option<&RepoId> {
        match self {
            TrainEvent::Status { repo, .. }
            | TrainEvent::Labeled { repo, .. }
            | TrainEvent::Unlabeled { repo, .. } => Some(repo),
            TrainEvent::Ping { repo } => repo.as_ref(),
        }
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            TrainEvent::Status { .. } => "status",
            TrainEvent::Labeled { .. } => "labeled",
            TrainEvent::Unlabeled { .. } => "unlabeled",
            TrainEvent::Ping { .. } => "ping",
        }
    }
}

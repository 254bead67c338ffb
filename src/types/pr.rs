//! Pull request metadata as the train evaluator sees it.
//!
//! These are the decoded forms of the REST responses for pull requests,
//! combined commit statuses and the labeled-issue listing.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{PrNumber, Sha};

/// GitHub's REST `mergeable_state` classification of a pull request.
///
/// Only [`MergeableState::Clean`] makes a PR ready to merge; every other
/// value either waits on pending CI or drops the PR from the train.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeableState {
    /// Mergeable and all required checks passing.
    Clean,
    /// Mergeable, but non-required checks are failing.
    Unstable,
    /// Blocked by branch protection (failed checks, missing reviews).
    Blocked,
    /// Head branch is behind its base.
    Behind,
    /// Merge conflicts.
    Dirty,
    /// GitHub has not computed mergeability yet.
    Unknown,
    /// Draft pull request.
    Draft,
    /// Merge hooks are configured on the repository.
    HasHooks,
}

impl MergeableState {
    /// Parses the REST API string. Missing or unrecognised values are `Unknown`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            Some("clean") => MergeableState::Clean,
            Some("unstable") => MergeableState::Unstable,
            Some("blocked") => MergeableState::Blocked,
            Some("behind") => MergeableState::Behind,
            Some("dirty") => MergeableState::Dirty,
            Some("draft") => MergeableState::Draft,
            Some("has_hooks") => MergeableState::HasHooks,
            Some("unknown") | None => MergeableState::Unknown,
            Some(other) => {
                tracing::warn!(state = other, "Unrecognised mergeable_state, treating as unknown");
                MergeableState::Unknown
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, MergeableState::Clean)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeableState::Clean => "clean",
            MergeableState::Unstable => "unstable",
            MergeableState::Blocked => "blocked",
            MergeableState::Behind => "behind",
            MergeableState::Dirty => "dirty",
            MergeableState::Unknown => "unknown",
            MergeableState::Draft => "draft",
            MergeableState::HasHooks => "has_hooks",
        }
    }
}

impl fmt::Display for MergeableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a single commit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusState {
    Pending,
    Success,
    Failure,
    Error,
}

impl StatusState {
    pub fn is_pending(&self) -> bool {
        matches!(self, StatusState::Pending)
    }
}

/// One entry of a combined status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitStatus {
    pub state: StatusState,
    /// The status context (e.g. "ci/build"). Absent in some fixtures.
    #[serde(default)]
    pub context: Option<String>,
}

/// The combined build status of a commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedStatus {
    pub statuses: Vec<CommitStatus>,
}

impl CombinedStatus {
    pub fn from_states(states: impl IntoIterator<Item = StatusState>) -> Self {
        CombinedStatus {
            statuses: states
                .into_iter()
                .map(|state| CommitStatus {
                    state,
                    context: None,
                })
                .collect(),
        }
    }

    /// True when at least one status is still pending.
    pub fn any_pending(&self) -> bool {
        self.statuses.iter().any(|s| s.state.is_pending())
    }
}

/// Pull request metadata needed to classify a train candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesetData {
    pub number: PrNumber,
    /// Label names currently on the PR.
    pub labels: Vec<String>,
    /// The branch the PR merges into.
    pub target_branch: String,
    /// Head commit, used to look up the combined status.
    pub head_sha: Sha,
    pub mergeable_state: MergeableState,
}

impl ChangesetData {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// An entry of the open-issue listing.
///
/// The issues endpoint returns pull requests too; only those with
/// `is_pull_request` set are train candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    pub number: PrNumber,
    pub is_pull_request: bool,
}

//! GitHub API effect types.
//!
//! These types describe the GitHub operations the train needs as data. The
//! evaluator and merge executor build effects; an interpreter executes them.

use serde::{Deserialize, Serialize};

use crate::types::{ChangesetData, CombinedStatus, IssueSummary, PrNumber, Sha};

/// A GitHub API effect.
///
/// Effects are repo-scoped: the interpreter is constructed for one `RepoId`,
/// so effects don't carry it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GitHubEffect {
    // ─── Queries ──────────────────────────────────────────────────────────────
    /// List open issues carrying `label`, oldest first.
    ListLabeledIssues { label: String },

    /// Fetch a single PR by number.
    GetPr { pr: PrNumber },

    /// Fetch the combined commit status of a revision.
    GetCombinedStatus { sha: Sha },

    // ─── Mutations ────────────────────────────────────────────────────────────
    /// Squash-merge a PR into its base branch.
    SquashMerge { pr: PrNumber },

    /// Post a new comment on a PR.
    PostComment { pr: PrNumber, body: String },
}

impl GitHubEffect {
    /// Returns true for effects that change state on GitHub.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            GitHubEffect::SquashMerge { .. } | GitHubEffect::PostComment { .. }
        )
    }
}

/// Response from a GitHub effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GitHubResponse {
    /// Response to `ListLabeledIssues`.
    Issues(Vec<IssueSummary>),

    /// Response to `GetPr`.
    Pr(ChangesetData),

    /// Response to `GetCombinedStatus`.
    CombinedStatus(CombinedStatus),

    /// Response to `SquashMerge`.
    Merged,

    /// Response to `PostComment`.
    CommentPosted,
}

impl GitHubResponse {
    /// Short name of the variant, for "unexpected response" errors.
    pub fn kind(&self) -> &'static str {
        match self {
            GitHubResponse::Issues(_) => "issues",
            GitHubResponse::Pr(_) => "pr",
            GitHubResponse::CombinedStatus(_) => "combined_status",
            GitHubResponse::Merged => "merged",
            GitHubResponse::CommentPosted => "comment_posted",
        }
    }
}

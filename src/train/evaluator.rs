//! Train evaluation: fetching candidates and classifying them.
//!
//! The classification itself is pure. Given each candidate's PR metadata and
//! combined status, [`plan_train`] decides which PRs stay in the train and
//! which are ready to merge. The async helpers here only gather the inputs.

use futures::future::try_join_all;

use crate::effects::{GitHubEffect, GitHubInterpreter, GitHubResponse};
use crate::types::{ChangesetData, CombinedStatus, MergeableState, PrNumber};

use super::error::TrainError;
use super::state::CodeFreeze;

/// A train candidate with its freshly fetched state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub pr: ChangesetData,
    pub status: CombinedStatus,
}

/// What happens to one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Targets a branch other than the code freeze branch.
    Frozen,
    /// No longer carries the merge label.
    Unlabeled,
    /// Clean: stays in the train and is ready to merge.
    Ready,
    /// Not clean yet, but CI is still running: stays in the train.
    Pending,
    /// Not clean and nothing pending: dropped.
    Blocked,
}

impl Classification {
    pub fn stays_in_train(&self) -> bool {
        matches!(self, Classification::Ready | Classification::Pending)
    }
}

/// The classification of one candidate plus the signals behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub pr: PrNumber,
    pub classification: Classification,
    pub labeled: bool,
    pub any_pending: bool,
    pub mergeable_state: MergeableState,
}

impl Verdict {
    /// The decision-log line for this candidate.
    pub fn describe(&self) -> String {
        if self.classification == Classification::Frozen {
            return format!(
                "{} is not pointing towards the code freeze branch. It will not be merged",
                self.pr.0
            );
        }
        format!(
            "{} from the merge train: pending checks: {} label: {} {}",
            self.pr.0,
            if self.any_pending {
                "pending"
            } else {
                "none pending"
            },
            if self.labeled { "labeled" } else { "not labeled" },
            self.mergeable_state
        )
    }
}

/// Classifies one candidate.
///
/// Rules, first match wins: frozen-out target, missing label, clean,
/// any pending status, otherwise blocked.
pub fn classify(candidate: &Candidate, label: &str, freeze: &CodeFreeze) -> Verdict {
    let labeled = candidate.pr.has_label(label);
    let any_pending = candidate.status.any_pending();
    let mergeable_state = candidate.pr.mergeable_state;

    let classification = if !freeze.admits(&candidate.pr.target_branch) {
        Classification::Frozen
    } else if !labeled {
        Classification::Unlabeled
    } else if mergeable_state.is_clean() {
        Classification::Ready
    } else if any_pending {
        Classification::Pending
    } else {
        Classification::Blocked
    };

    Verdict {
        pr: candidate.pr.number,
        classification,
        labeled,
        any_pending,
        mergeable_state,
    }
}

/// The outcome of classifying every candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainPlan {
    /// Surviving candidates, in candidate order.
    pub new_train: Vec<PrNumber>,
    /// The clean subset of `new_train`, in the same order.
    pub ready: Vec<PrNumber>,
    pub verdicts: Vec<Verdict>,
}

impl TrainPlan {
    /// True when nothing in the new train is still waiting on CI.
    ///
    /// An empty plan is trivially ready; merging it is a no-op.
    pub fn all_ready(&self) -> bool {
        self.new_train.len() == self.ready.len()
    }
}

/// Classifies candidates in order. A PR that appears twice is only
/// considered once.
pub fn plan_train(candidates: &[Candidate], label: &str, freeze: &CodeFreeze) -> TrainPlan {
    let mut plan = TrainPlan {
        new_train: Vec::new(),
        ready: Vec::new(),
        verdicts: Vec::new(),
    };

    for candidate in candidates {
        if plan.verdicts.iter().any(|v| v.pr == candidate.pr.number) {
            continue;
        }

        let verdict = classify(candidate, label, freeze);
        if verdict.classification.stays_in_train() {
            plan.new_train.push(verdict.pr);
        }
        if verdict.classification == Classification::Ready {
            plan.ready.push(verdict.pr);
        }
        plan.verdicts.push(verdict);
    }

    plan
}

// ─── Fetching ─────────────────────────────────────────────────────────────────

/// Lists open PRs carrying `label`, oldest first. Plain issues are skipped.
pub async fn seed_candidates<I: GitHubInterpreter>(
    interpreter: &I,
    label: &str,
) -> Result<Vec<PrNumber>, TrainError> {
    let effect = GitHubEffect::ListLabeledIssues {
        label: label.to_string(),
    };
    match interpreter.interpret(effect).await? {
        GitHubResponse::Issues(issues) => Ok(issues
            .into_iter()
            .filter(|issue| issue.is_pull_request)
            .map(|issue| issue.number)
            .collect()),
        other => Err(TrainError::unexpected("issues", &other)),
    }
}

/// Fetches a PR's metadata.
pub async fn fetch_pr<I: GitHubInterpreter>(
    interpreter: &I,
    pr: PrNumber,
) -> Result<ChangesetData, TrainError> {
    match interpreter.interpret(GitHubEffect::GetPr { pr }).await? {
        GitHubResponse::Pr(data) => Ok(data),
        other => Err(TrainError::unexpected("pr", &other)),
    }
}

async fn fetch_candidate<I: GitHubInterpreter>(
    interpreter: &I,
    pr: PrNumber,
) -> Result<Candidate, TrainError> {
    let data = fetch_pr(interpreter, pr).await?;
    let effect = GitHubEffect::GetCombinedStatus {
        sha: data.head_sha.clone(),
    };
    match interpreter.interpret(effect).await? {
        GitHubResponse::CombinedStatus(status) => Ok(Candidate { pr: data, status }),
        other => Err(TrainError::unexpected("combined_status", &other)),
    }
}

/// Fetches every candidate concurrently, preserving order.
///
/// The first failure aborts the whole fetch.
pub async fn fetch_candidates<I: GitHubInterpreter>(
    interpreter: &I,
    prs: &[PrNumber],
) -> Result<Vec<Candidate>, TrainError> {
    try_join_all(prs.iter().map(|pr| fetch_candidate(interpreter, *pr))).await
}

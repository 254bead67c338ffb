//! Merging a ready batch.
//!
//! Every PR in the batch is merged independently and concurrently: a failure
//! on one PR never stops the others. Failed PRs are reported, not retried.

use futures::future::join_all;
use serde::Serialize;

use crate::effects::{GitHubEffect, GitHubInterpreter};
use crate::types::{PrNumber, format_pr_list};

/// A PR that could not be merged (or acknowledged).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergeFailure {
    pub pr: PrNumber,
    pub reason: String,
}

/// The settled outcome of a batch, in batch order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub merged: Vec<PrNumber>,
    pub failed: Vec<MergeFailure>,
}

impl MergeReport {
    /// `succeeded in merging [..], failed to merge [..]`
    pub fn summary(&self) -> String {
        let failed: Vec<PrNumber> = self.failed.iter().map(|f| f.pr).collect();
        format!(
            "succeeded in merging {}, failed to merge {}",
            format_pr_list(&self.merged),
            format_pr_list(&failed)
        )
    }

    /// One `#n: reason` entry per failure, or `None` when all merged.
    pub fn failure_reasons(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        let reasons: Vec<String> = self
            .failed
            .iter()
            .map(|f| format!("{}: {}", f.pr, f.reason))
            .collect();
        Some(format!("failure reasons: {}", reasons.join("; ")))
    }
}

/// The comment posted on every merged PR.
pub fn acknowledgement(app_name: &str) -> String {
    format!(
        "This PR was merged by {}. Thanks for your contribution.",
        app_name
    )
}

/// Squash-merges one PR, then thanks its author.
async fn merge_one<I: GitHubInterpreter>(
    interpreter: &I,
    pr: PrNumber,
    comment: &str,
) -> Result<(), String> {
    interpreter
        .interpret(GitHubEffect::SquashMerge { pr })
        .await
        .map_err(|e| format!("merge failed: {}", e))?;

    interpreter
        .interpret(GitHubEffect::PostComment {
            pr,
            body: comment.to_string(),
        })
        .await
        .map_err(|e| format!("merged, but comment failed: {}", e))?;

    Ok(())
}

/// Attempts every merge in `batch` and waits for all of them to settle.
pub async fn merge_batch<I: GitHubInterpreter>(
    interpreter: &I,
    batch: &[PrNumber],
    app_name: &str,
) -> MergeReport {
    let comment = acknowledgement(app_name);
    let outcomes = join_all(batch.iter().map(|pr| {
        let comment = &comment;
        async move { (*pr, merge_one(interpreter, *pr, comment).await) }
    }))
    .await;

    let mut report = MergeReport::default();
    for (pr, outcome) in outcomes {
        match outcome {
            Ok(()) => {
                tracing::info!(pr = %pr, "Merged");
                report.merged.push(pr);
            }
            Err(reason) => {
                tracing::warn!(pr = %pr, reason = %reason, "Merge attempt failed");
                report.failed.push(MergeFailure { pr, reason });
            }
        }
    }
    report
}

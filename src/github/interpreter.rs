//! REST mapping of GitHub effects.
//!
//! `RepoClient` turns each [`GitHubEffect`] into one or more REST requests
//! against a single repository and decodes the replies into domain types.
//! It only ever sees 2xx responses: the transport categorizes failures and
//! the conditional cache answers 304s.

use std::sync::Arc;

use serde::Deserialize;

use crate::effects::{GitHubEffect, GitHubInterpreter, GitHubResponse};
use crate::types::{
    ChangesetData, CombinedStatus, IssueSummary, MergeableState, PrNumber, RepoId, Sha,
};

use super::error::GitHubApiError;
use super::transport::{ApiRequest, HttpTransport};

/// The public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const PER_PAGE: usize = 100;

/// Upper bound on pages followed for the labeled-issue listing.
const MAX_PAGES: u32 = 50;

// ─── Wire Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: u64,
    /// Present (as an object of links) only when the issue is a PR.
    #[serde(default)]
    pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawBase {
    #[serde(rename = "ref")]
    ref_field: String,
}

#[derive(Debug, Deserialize)]
struct RawHead {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct RawPull {
    number: u64,
    #[serde(default)]
    labels: Vec<RawLabel>,
    base: RawBase,
    head: RawHead,
    #[serde(default)]
    mergeable_state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMerge {
    merged: bool,
    #[serde(default)]
    message: Option<String>,
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// A GitHub interpreter scoped to one repository.
pub struct RepoClient<T> {
    transport: Arc<T>,
    repo: RepoId,
    base_url: String,
}

impl<T: HttpTransport> RepoClient<T> {
    /// Creates a client for `repo`. `base_url` is the API root, such as
    /// [`DEFAULT_API_URL`].
    pub fn new(transport: Arc<T>, repo: RepoId, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            transport,
            repo,
            base_url,
        }
    }

    pub fn repo(&self) -> &RepoId {
        &self.repo
    }

    /// Absolute URL of a path below `/repos/{owner}/{repo}/`.
    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.base_url,
            urlencoding::encode(&self.repo.owner),
            urlencoding::encode(&self.repo.repo),
            path
        )
    }

    async fn list_labeled_issues(&self, label: &str) -> Result<GitHubResponse, GitHubApiError> {
        let mut issues = Vec::new();
        let mut page = 1u32;

        loop {
            let url = self.repo_url(&format!(
                "issues?state=open&labels={}&sort=created&direction=asc&per_page={}&page={}",
                urlencoding::encode(label),
                PER_PAGE,
                page
            ));
            let raw: Vec<RawIssue> = self.transport.send(ApiRequest::get(url)).await?.json()?;
            let is_last_page = raw.len() < PER_PAGE;

            issues.extend(raw.into_iter().map(|issue| IssueSummary {
                number: PrNumber(issue.number),
                is_pull_request: issue.pull_request.is_some(),
            }));

            if is_last_page {
                break;
            }
            if page >= MAX_PAGES {
                tracing::warn!(repo = %self.repo, label, "Stopped paging labeled issues at page limit");
                break;
            }
            page += 1;
        }

        Ok(GitHubResponse::Issues(issues))
    }

    async fn get_pr(&self, pr: PrNumber) -> Result<GitHubResponse, GitHubApiError> {
        let url = self.repo_url(&format!("pulls/{}", pr.0));
        let raw: RawPull = self.transport.send(ApiRequest::get(url)).await?.json()?;

        Ok(GitHubResponse::Pr(ChangesetData {
            number: PrNumber(raw.number),
            labels: raw.labels.into_iter().map(|l| l.name).collect(),
            target_branch: raw.base.ref_field,
            head_sha: Sha::new(raw.head.sha),
            mergeable_state: MergeableState::parse(raw.mergeable_state.as_deref()),
        }))
    }

    async fn get_combined_status(&self, sha: &Sha) -> Result<GitHubResponse, GitHubApiError> {
        let url = self.repo_url(&format!(
            "commits/{}/status",
            urlencoding::encode(sha.as_str())
        ));
        let status: CombinedStatus = self.transport.send(ApiRequest::get(url)).await?.json()?;
        Ok(GitHubResponse::CombinedStatus(status))
    }

    async fn squash_merge(&self, pr: PrNumber) -> Result<GitHubResponse, GitHubApiError> {
        let url = self.repo_url(&format!("pulls/{}/merge", pr.0));
        let body = serde_json::json!({ "merge_method": "squash" });
        let raw: RawMerge = self.transport.send(ApiRequest::put(url, body)).await?.json()?;

        if raw.merged {
            Ok(GitHubResponse::Merged)
        } else {
            Err(GitHubApiError::permanent_without_source(format!(
                "Merge request returned merged=false: {}",
                raw.message.as_deref().unwrap_or("unknown reason")
            )))
        }
    }

    async fn post_comment(&self, pr: PrNumber, body: String) -> Result<GitHubResponse, GitHubApiError> {
        let url = self.repo_url(&format!("issues/{}/comments", pr.0));
        self.transport
            .send(ApiRequest::post(url, serde_json::json!({ "body": body })))
            .await?;
        Ok(GitHubResponse::CommentPosted)
    }
}

impl<T: HttpTransport> GitHubInterpreter for RepoClient<T> {
    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, GitHubApiError> {
        match effect {
            GitHubEffect::ListLabeledIssues { label } => self.list_labeled_issues(&label).await,
            GitHubEffect::GetPr { pr } => self.get_pr(pr).await,
            GitHubEffect::GetCombinedStatus { sha } => self.get_combined_status(&sha).await,
            GitHubEffect::SquashMerge { pr } => self.squash_merge(pr).await,
            GitHubEffect::PostComment { pr, body } => self.post_comment(pr, body).await,
        }
    }
}

impl<T> std::fmt::Debug for RepoClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepoClient")
            .field("repo", &self.repo)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

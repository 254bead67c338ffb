//! Shared test doubles.
//!
//! - [`FakeGitHub`] is an in-memory [`GitHubInterpreter`] for train tests.
//! - [`FakeTransport`] is a scripted [`HttpTransport`] for the REST layer.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use http::HeaderMap;

use crate::effects::{GitHubEffect, GitHubInterpreter, GitHubResponse};
use crate::github::{ApiRequest, ApiResponse, GitHubApiError, HttpTransport};
use crate::types::{
    ChangesetData, CombinedStatus, IssueSummary, MergeableState, PrNumber, Sha, StatusState,
};

/// Builds PR metadata whose head is `sha-{n}`.
pub fn changeset(
    n: u64,
    labels: &[&str],
    target: &str,
    mergeable_state: MergeableState,
) -> ChangesetData {
    ChangesetData {
        number: PrNumber(n),
        labels: labels.iter().map(|l| l.to_string()).collect(),
        target_branch: target.to_string(),
        head_sha: Sha::new(format!("sha-{}", n)),
        mergeable_state,
    }
}

#[derive(Default)]
struct FakeGitHubState {
    issues: Vec<IssueSummary>,
    prs: HashMap<PrNumber, ChangesetData>,
    statuses: HashMap<Sha, CombinedStatus>,
    failing_merges: HashSet<PrNumber>,
    failing_comments: HashSet<PrNumber>,
    failing_fetches: HashSet<PrNumber>,
    effects: Vec<GitHubEffect>,
    merged: Vec<PrNumber>,
    comments: Vec<(PrNumber, String)>,
}

/// An in-memory GitHub repository.
///
/// Clones share state, so a test can keep a handle while the controller
/// owns another.
#[derive(Clone, Default)]
pub struct FakeGitHub {
    state: Arc<Mutex<FakeGitHubState>>,
}

impl FakeGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeGitHubState> {
        self.state.lock().unwrap()
    }

    /// Registers a PR and the combined status of its head commit.
    /// Replaces any previous registration.
    pub fn add_pr(&self, pr: ChangesetData, statuses: &[StatusState]) {
        let mut state = self.lock();
        state.statuses.insert(
            pr.head_sha.clone(),
            CombinedStatus::from_states(statuses.iter().copied()),
        );
        state.prs.insert(pr.number, pr);
    }

    /// Adds an entry to the labeled-issue listing.
    pub fn add_labeled_issue(&self, number: PrNumber, is_pull_request: bool) {
        self.lock().issues.push(IssueSummary {
            number,
            is_pull_request,
        });
    }

    pub fn fail_merge(&self, pr: PrNumber) {
        self.lock().failing_merges.insert(pr);
    }

    pub fn fail_comment(&self, pr: PrNumber) {
        self.lock().failing_comments.insert(pr);
    }

    pub fn fail_pr_fetch(&self, pr: PrNumber) {
        self.lock().failing_fetches.insert(pr);
    }

    /// Every effect interpreted so far, in order.
    pub fn effects(&self) -> Vec<GitHubEffect> {
        self.lock().effects.clone()
    }

    pub fn clear_effects(&self) {
        self.lock().effects.clear();
    }

    /// PRs successfully merged, in order.
    pub fn merged(&self) -> Vec<PrNumber> {
        self.lock().merged.clone()
    }

    pub fn comments(&self) -> Vec<(PrNumber, String)> {
        self.lock().comments.clone()
    }

    fn apply(&self, effect: GitHubEffect) -> Result<GitHubResponse, GitHubApiError> {
        let mut state = self.lock();
        state.effects.push(effect.clone());

        match effect {
            GitHubEffect::ListLabeledIssues { .. } => {
                Ok(GitHubResponse::Issues(state.issues.clone()))
            }
            GitHubEffect::GetPr { pr } => {
                if state.failing_fetches.contains(&pr) {
                    return Err(server_error());
                }
                state
                    .prs
                    .get(&pr)
                    .cloned()
                    .map(GitHubResponse::Pr)
                    .ok_or_else(not_found)
            }
            GitHubEffect::GetCombinedStatus { sha } => state
                .statuses
                .get(&sha)
                .cloned()
                .map(GitHubResponse::CombinedStatus)
                .ok_or_else(not_found),
            GitHubEffect::SquashMerge { pr } => {
                if state.failing_merges.contains(&pr) || !state.prs.contains_key(&pr) {
                    return Err(GitHubApiError::from_status(
                        405,
                        HeaderMap::new(),
                        r#"{"message":"Pull Request is not mergeable"}"#,
                    ));
                }
                state.merged.push(pr);
                Ok(GitHubResponse::Merged)
            }
            GitHubEffect::PostComment { pr, body } => {
                if state.failing_comments.contains(&pr) {
                    return Err(server_error());
                }
                state.comments.push((pr, body));
                Ok(GitHubResponse::CommentPosted)
            }
        }
    }
}

fn not_found() -> GitHubApiError {
    GitHubApiError::from_status(404, HeaderMap::new(), r#"{"message":"Not Found"}"#)
}

fn server_error() -> GitHubApiError {
    GitHubApiError::from_status(502, HeaderMap::new(), r#"{"message":"Bad Gateway"}"#)
}

impl GitHubInterpreter for FakeGitHub {
    async fn interpret(&self, effect: GitHubEffect) -> Result<GitHubResponse, GitHubApiError> {
        self.apply(effect)
    }
}

/// A transport that records requests and replays scripted results in order.
#[derive(Clone, Default)]
pub struct FakeTransport {
    script: Arc<Mutex<VecDeque<Result<ApiResponse, GitHubApiError>>>>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, response: ApiResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_err(&self, error: GitHubApiError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    /// Requests sent so far, in order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl HttpTransport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GitHubApiError> {
        self.requests.lock().unwrap().push(request);
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(GitHubApiError::permanent_without_source(
                "no scripted response",
            ))
        })
    }
}

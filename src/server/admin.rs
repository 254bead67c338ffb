//! Administrative JSON endpoints.
//!
//! Read-only views of every repository's train and decision log, plus the
//! switches an operator needs: the per-repository `enabled` and
//! `mutation_enabled` flags and the global code freeze.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::AppState;
use crate::effects::GitHubInterpreter;
use crate::github::CacheStats;
use crate::train::{CodeFreeze, RepoFlag, RepoSnapshot, UnknownFlag};
use crate::types::RepoId;

#[derive(Debug, Error)]
pub enum AdminError {
    /// No event has been seen for this repository.
    #[error("repository not found: {0}")]
    NotFound(RepoId),

    #[error("{0}")]
    UnknownFlag(#[from] UnknownFlag),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminError::NotFound(_) => StatusCode::NOT_FOUND,
            AdminError::UnknownFlag(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct Overview {
    pub repos: Vec<RepoSnapshot>,
    pub cache: CacheStats,
}

/// Body of a flag update. An absent value toggles.
#[derive(Debug, Default, Deserialize)]
pub struct FlagUpdate {
    #[serde(default)]
    pub value: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct FlagState {
    pub repo: String,
    pub flag: RepoFlag,
    pub value: bool,
}

#[derive(Debug, Serialize)]
pub struct CodeFreezeApplied {
    pub enforce: bool,
    pub branch: String,
    pub repos: usize,
}

/// `GET /api/v1/repos`
pub async fn list_repos<I: GitHubInterpreter>(State(app_state): State<AppState<I>>) -> Json<Overview> {
    Json(Overview {
        repos: app_state.registry.snapshots().await,
        cache: app_state.cache.stats(),
    })
}

/// `GET /api/v1/repos/{owner}/{repo}`
pub async fn get_repo<I: GitHubInterpreter>(
    State(app_state): State<AppState<I>>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<RepoSnapshot>, AdminError> {
    let repo = RepoId::new(owner, repo);
    match app_state.registry.get(&repo).await {
        Some(controller) => Ok(Json(controller.snapshot())),
        None => Err(AdminError::NotFound(repo)),
    }
}

/// `POST /api/v1/repos/{owner}/{repo}/flags/{flag}`
///
/// Sets the flag to `value`, or flips it when the body has no value.
pub async fn update_flag<I: GitHubInterpreter>(
    State(app_state): State<AppState<I>>,
    Path((owner, repo, flag)): Path<(String, String, String)>,
    Json(update): Json<FlagUpdate>,
) -> Result<Json<FlagState>, AdminError> {
    let flag: RepoFlag = flag.parse()?;
    let repo = RepoId::new(owner, repo);
    let controller = app_state
        .registry
        .get(&repo)
        .await
        .ok_or_else(|| AdminError::NotFound(repo.clone()))?;

    let value = match update.value {
        Some(value) => {
            controller.set_flag(flag, value);
            value
        }
        None => controller.toggle_flag(flag),
    };

    Ok(Json(FlagState {
        repo: repo.to_string(),
        flag,
        value,
    }))
}

/// `POST /api/v1/code-freeze`
///
/// Applies the setting to every known repository.
pub async fn set_code_freeze<I: GitHubInterpreter>(
    State(app_state): State<AppState<I>>,
    Json(code_freeze): Json<CodeFreeze>,
) -> Json<CodeFreezeApplied> {
    let repos = app_state.registry.set_code_freeze_all(code_freeze.clone()).await;
    info!(enforce = code_freeze.enforce, branch = %code_freeze.branch, repos, "Code freeze updated");
    Json(CodeFreezeApplied {
        enforce: code_freeze.enforce,
        branch: code_freeze.branch,
        repos,
    })
}

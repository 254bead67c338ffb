//! GitHub webhook payload parser.
//!
//! Parses raw webhook JSON payloads into typed [`TrainEvent`] values.
//!
//! # Parsing Strategy
//!
//! 1. The event type is determined from the `X-GitHub-Event` header
//! 2. The payload is parsed according to the event type
//! 3. Unknown event types and unhandled actions return `Ok(None)`
//! 4. Malformed payloads return `Err` with details
//!
//! Unknown fields are ignored everywhere.

use serde::Deserialize;
use thiserror::Error;

use crate::types::{PrNumber, RepoId, Sha, StatusState};

use super::events::TrainEvent;

/// Error type for webhook parsing failures.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON deserialization failed (includes missing required fields).
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Field has an invalid value (e.g., unknown status state).
    #[error("invalid field value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },
}

/// Parses a webhook payload into a typed event.
///
/// * `Ok(Some(event))` - an event the train reacts to
/// * `Ok(None)` - an event type or action the train ignores
/// * `Err(e)` - malformed payload or missing required fields
///
/// # Examples
///
/// ```
/// use steward_bot::webhooks::{TrainEvent, parse_webhook};
///
/// let payload = br#"{
///     "action": "labeled",
///     "label": { "name": "ready-to-merge" },
///     "pull_request": { "number": 42 },
///     "repository": { "owner": { "login": "octo" }, "name": "widgets" }
/// }"#;
///
/// let event = parse_webhook("pull_request", payload).unwrap();
/// assert!(matches!(event, Some(TrainEvent::Labeled { .. })));
/// ```
pub fn parse_webhook(event_type: &str, payload: &[u8]) -> Result<Option<TrainEvent>, ParseError> {
    match event_type {
        "status" => parse_status(payload).map(Some),
        "pull_request" => parse_pull_request(payload),
        "ping" => parse_ping(payload).map(Some),
        _ => Ok(None),
    }
}

// ============================================================================
// Raw payload structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawRepository {
    owner: RawOwner,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: String,
}

impl RawRepository {
    fn into_repo_id(self) -> RepoId {
        RepoId::new(self.owner.login, self.name)
    }
}

// ============================================================================
// status event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawStatusPayload {
    sha: String,
    state: String,
    repository: RawRepository,
}

fn parse_status(payload: &[u8]) -> Result<TrainEvent, ParseError> {
    let raw: RawStatusPayload = serde_json::from_slice(payload)?;

    let state = match raw.state.as_str() {
        "pending" => StatusState::Pending,
        "success" => StatusState::Success,
        "failure" => StatusState::Failure,
        "error" => StatusState::Error,
        other => {
            return Err(ParseError::InvalidField {
                field: "state",
                value: other.to_string(),
            });
        }
    };

    Ok(TrainEvent::Status {
        repo: raw.repository.into_repo_id(),
        sha: Sha::new(raw.sha),
        state,
    })
}

// ============================================================================
// pull_request event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPullRequestPayload {
    action: String,
    #[serde(default)]
    label: Option<RawLabel>,
    pull_request: RawPullRequest,
    repository: RawRepository,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: u64,
}

fn parse_pull_request(payload: &[u8]) -> Result<Option<TrainEvent>, ParseError> {
    let raw: RawPullRequestPayload = serde_json::from_slice(payload)?;

    let labeled = match raw.action.as_str() {
        "labeled" => true,
        "unlabeled" => false,
        _ => return Ok(None),
    };

    let label = raw
        .label
        .ok_or_else(|| ParseError::InvalidField {
            field: "label",
            value: "missing".to_string(),
        })?
        .name;
    let repo = raw.repository.into_repo_id();
    let pr = PrNumber(raw.pull_request.number);

    Ok(Some(if labeled {
        TrainEvent::Labeled { repo, pr, label }
    } else {
        TrainEvent::Unlabeled { repo, pr, label }
    }))
}

// ============================================================================
// ping event
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawPingPayload {
    #[serde(default)]
    repository: Option<RawRepository>,
}

fn parse_ping(payload: &[u8]) -> Result<TrainEvent, ParseError> {
    let raw: RawPingPayload = serde_json::from_slice(payload)?;
    Ok(TrainEvent::Ping {
        repo: raw.repository.map(RawRepository::into_repo_id),
    })
}

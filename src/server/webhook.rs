//! Webhook endpoint handler.
//!
//! Verifies the delivery's signature, parses the events the train reacts to
//! and hands them to the registry. Work happens on the repository's queue,
//! so the handler answers as soon as the job is queued.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::AppState;
use crate::effects::GitHubInterpreter;
use crate::types::DeliveryId;
use crate::webhooks::{SignatureError, parse_webhook};

/// Header name for GitHub event type.
const HEADER_EVENT: &str = "x-github-event";
/// Header name for GitHub delivery ID.
const HEADER_DELIVERY: &str = "x-github-delivery";
/// Header name for GitHub signature.
const HEADER_SIGNATURE: &str = "x-hub-signature-256";

/// Errors that can occur when accepting a webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature: {0}")]
    InvalidSignature(#[from] SignatureError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::MissingHeader(_) => StatusCode::BAD_REQUEST,
            WebhookError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
        };

        (status, self.to_string()).into_response()
    }
}

/// Webhook handler.
///
/// # Response
///
/// - 202 Accepted: the delivery was verified. Ignored event types and
///   malformed payloads are logged and also answered with 202, since GitHub
///   would only redeliver the same bytes.
/// - 400 Bad Request: missing `X-GitHub-Event` or `X-Hub-Signature-256`
/// - 401 Unauthorized: signature does not match
pub async fn webhook_handler<I: GitHubInterpreter>(
    State(app_state): State<AppState<I>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let event_type = get_header(&headers, HEADER_EVENT)?;
    let signature = get_header(&headers, HEADER_SIGNATURE)?;
    let delivery_id = get_header(&headers, HEADER_DELIVERY)
        .map(DeliveryId::new)
        .unwrap_or_else(|_| DeliveryId::unknown());

    // Verify before touching the payload.
    if let Err(e) = app_state.secret.verify(&body, signature) {
        warn!(delivery_id = %delivery_id, error = %e, "Rejected webhook signature");
        return Err(e.into());
    }

    let event = match parse_webhook(event_type, &body) {
        Ok(Some(event)) => event,
        Ok(None) => {
            debug!(delivery_id = %delivery_id, event_type, "Ignoring event");
            return Ok((StatusCode::ACCEPTED, "Ignored"));
        }
        Err(e) => {
            warn!(delivery_id = %delivery_id, event_type, error = %e, "Malformed webhook payload");
            return Ok((StatusCode::ACCEPTED, "Ignored (malformed)"));
        }
    };

    let queued = app_state.registry.handle_event(&event).await;
    info!(
        delivery_id = %delivery_id,
        kind = event.kind(),
        repo = ?event.repo().map(ToString::to_string),
        queued,
        "Webhook accepted"
    );
    Ok((StatusCode::ACCEPTED, "Accepted"))
}

/// Extracts a required header value as a string.
fn get_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, WebhookError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingHeader(name))
}

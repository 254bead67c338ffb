//! GitHub API error types.
//!
//! Errors are categorized so the HTTP client and the conditional cache can
//! react to them:
//!
//! - **Transient** errors are retriable by the client for idempotent reads
//!   (5xx, rate limits, network failures).
//! - **Permanent** errors are returned to the caller as-is (most 4xx,
//!   unmergeable PRs, malformed responses).
//! - **NotModified** (HTTP 304) answers a conditional GET. The conditional
//!   cache turns it into the cached response; callers above the cache never
//!   see it unless no cached entry exists.

use std::fmt;

use http::HeaderMap;
use thiserror::Error;

/// The kind of GitHub API error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitHubErrorKind {
    /// Safe to retry with backoff (reads only).
    ///
    /// Examples:
    /// - HTTP 5xx (server errors)
    /// - HTTP 429 (rate limited)
    /// - HTTP 403 with a rate limit message
    /// - Network timeouts
    Transient,

    /// Requires human intervention or a new event.
    ///
    /// Examples:
    /// - HTTP 4xx (except rate limits)
    /// - "Pull Request is not mergeable" (HTTP 405)
    /// - Responses that fail to decode
    Permanent,

    /// HTTP 304 in answer to an `If-None-Match` precondition.
    NotModified,
}

impl GitHubErrorKind {
    /// Returns true if this error is retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(self, GitHubErrorKind::Transient)
    }
}

/// A GitHub API error with categorization.
#[derive(Debug, Error)]
pub struct GitHubApiError {
    /// The kind of error.
    pub kind: GitHubErrorKind,

    /// The HTTP status code, if a response was received.
    pub status_code: Option<u16>,

    /// A human-readable description of the error.
    pub message: String,

    /// Response headers, if a response was received.
    ///
    /// Kept so rate-limit telemetry can be read from failed responses too.
    pub headers: Option<HeaderMap>,

    /// The underlying octocrab error, if available.
    #[source]
    pub source: Option<octocrab::Error>,
}

impl fmt::Display for GitHubApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "GitHub API error (HTTP {}): {}", code, self.message),
            None => write!(f, "GitHub API error: {}", self.message),
        }
    }
}

impl GitHubApiError {
    /// Creates a permanent error without a response or source.
    pub fn permanent_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Permanent,
            status_code: None,
            message: message.into(),
            headers: None,
            source: None,
        }
    }

    /// Creates a transient error without a response or source.
    pub fn transient_without_source(message: impl Into<String>) -> Self {
        Self {
            kind: GitHubErrorKind::Transient,
            status_code: None,
            message: message.into(),
            headers: None,
            source: None,
        }
    }

    /// Creates a 304 Not Modified error carrying the response headers.
    pub fn not_modified(headers: HeaderMap) -> Self {
        Self {
            kind: GitHubErrorKind::NotModified,
            status_code: Some(304),
            message: "not modified".to_string(),
            headers: Some(headers),
            source: None,
        }
    }

    /// Categorizes a non-success HTTP response.
    ///
    /// `body` is the response body, which GitHub fills with a JSON
    /// `{"message": ...}` document for most errors.
    pub fn from_status(status: u16, headers: HeaderMap, body: &str) -> Self {
        if status == 304 {
            return Self::not_modified(headers);
        }

        let message = extract_message(body).unwrap_or_else(|| format!("HTTP {}", status));

        let kind = match status {
            429 => GitHubErrorKind::Transient,
            403 if is_rate_limit_error(&message) || rate_limit_exhausted(&headers) => {
                GitHubErrorKind::Transient
            }
            code if (500..600).contains(&code) => GitHubErrorKind::Transient,
            _ => GitHubErrorKind::Permanent,
        };

        Self {
            kind,
            status_code: Some(status),
            message,
            headers: Some(headers),
            source: None,
        }
    }

    /// Categorizes an octocrab error raised before any response was read.
    pub fn from_octocrab(err: octocrab::Error) -> Self {
        let message = err.to_string();
        let kind = if is_network_error(&message) {
            GitHubErrorKind::Transient
        } else {
            GitHubErrorKind::Permanent
        };

        Self {
            kind,
            status_code: None,
            message,
            headers: None,
            source: Some(err),
        }
    }

    /// Returns true for an HTTP 304 answer.
    pub fn is_not_modified(&self) -> bool {
        self.kind == GitHubErrorKind::NotModified
    }
}

/// Pulls the `message` field out of a GitHub error document.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("message")?.as_str().map(str::to_string)
}

/// Checks if an error message indicates a rate limit.
fn is_rate_limit_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("rate limit")
        || message_lower.contains("secondary rate")
        || message_lower.contains("abuse detection")
}

/// A 403 with `x-ratelimit-remaining: 0` is a primary rate limit.
fn rate_limit_exhausted(headers: &HeaderMap) -> bool {
    headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0")
}

/// Checks if an error message indicates a network-level error.
fn is_network_error(message: &str) -> bool {
    let message_lower = message.to_lowercase();
    message_lower.contains("timeout")
        || message_lower.contains("timed out")
        || message_lower.contains("connection")
        || message_lower.contains("network")
        || message_lower.contains("dns")
        || message_lower.contains("hyper")
}

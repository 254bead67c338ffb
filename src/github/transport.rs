//! Raw HTTP seam between the REST mapping and the network.
//!
//! Everything the bot sends to GitHub goes through an [`HttpTransport`]. The
//! production stack is `ConditionalCache<OctocrabTransport>`; tests substitute
//! a scripted transport.

use std::future::Future;

use http::{HeaderMap, HeaderValue, Method};
use serde::de::DeserializeOwned;

use super::error::GitHubApiError;

/// Header carrying the request quota of the current credentials.
pub const RATE_LIMIT_TOTAL: &str = "x-ratelimit-limit";

/// Header carrying the remaining request quota.
pub const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// An outbound API request. `url` is absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn put(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::PUT,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            headers: HeaderMap::new(),
            body: Some(body),
        }
    }

    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

/// A successful (2xx) API response.
///
/// Non-success statuses never reach callers as an `ApiResponse`; transports
/// turn them into [`GitHubApiError`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    /// Builds a 200 response with the given JSON body.
    pub fn ok_json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header, ignoring values that aren't valid header text.
    pub fn with_header(mut self, name: &'static str, value: &str) -> Self {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// The entity tag of the response, if any.
    pub fn etag(&self) -> Option<&str> {
        header_str(&self.headers, http::header::ETAG.as_str())
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GitHubApiError> {
        serde_json::from_str(&self.body).map_err(|e| {
            GitHubApiError::permanent_without_source(format!("Malformed response body: {}", e))
        })
    }
}

/// Reads a header as text.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Sends raw API requests.
pub trait HttpTransport: Send + Sync + 'static {
    /// Sends a request.
    ///
    /// Returns the response for 2xx statuses and a categorized
    /// [`GitHubApiError`] otherwise.
    fn send(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, GitHubApiError>> + Send;
}

//! Octocrab-backed HTTP transport.
//!
//! `OctocrabTransport` owns the authenticated `Octocrab` instance and sends
//! raw requests through it. It is not scoped to a repository: the
//! repository lives in the URL, which `RepoClient` builds.

use http::{HeaderMap, Method};
use octocrab::Octocrab;

use super::error::GitHubApiError;
use super::retry::{RetryConfig, RetryPolicy, retry_with_backoff};
use super::transport::{ApiRequest, ApiResponse, HttpTransport};

/// Sends API requests with octocrab.
///
/// GETs are retried on transient errors. Merges and comments are sent once.
#[derive(Clone)]
pub struct OctocrabTransport {
    client: Octocrab,
    retry_config: RetryConfig,
}

impl OctocrabTransport {
    pub fn new(client: Octocrab) -> Self {
        Self {
            client,
            retry_config: RetryConfig::DEFAULT,
        }
    }

    /// Creates a transport authenticated with a personal access token.
    pub fn from_token(token: impl Into<String>) -> Result<Self, octocrab::Error> {
        let client = Octocrab::builder().personal_token(token.into()).build()?;
        Ok(Self::new(client))
    }

    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Returns a reference to the underlying octocrab client.
    pub fn inner(&self) -> &Octocrab {
        &self.client
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse, GitHubApiError> {
        let url = request.url.as_str();
        let response = match request.method {
            Method::GET => {
                self.client
                    ._get_with_headers(url, Some(request.headers.clone()))
                    .await
            }
            Method::PUT => self.client._put(url, request.body.as_ref()).await,
            Method::POST => self.client._post(url, request.body.as_ref()).await,
            ref other => {
                return Err(GitHubApiError::permanent_without_source(format!(
                    "Unsupported method {}",
                    other
                )));
            }
        }
        .map_err(GitHubApiError::from_octocrab)?;

        let status = response.status().as_u16();
        let headers: HeaderMap = response.headers().clone();
        let body = self
            .client
            .body_to_string(response)
            .await
            .map_err(GitHubApiError::from_octocrab)?;

        if (200..300).contains(&status) {
            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        } else {
            Err(GitHubApiError::from_status(status, headers, &body))
        }
    }
}

impl HttpTransport for OctocrabTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, GitHubApiError> {
        let policy = if request.is_get() {
            RetryPolicy::RetryTransient
        } else {
            RetryPolicy::NoRetry
        };

        tracing::trace!(method = %request.method, url = %request.url, "GitHub request");

        retry_with_backoff(self.retry_config, policy, || self.send_once(&request))
            .await
            .into_result()
    }
}

impl std::fmt::Debug for OctocrabTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctocrabTransport")
            .field("retry_config", &self.retry_config)
            .finish_non_exhaustive()
    }
}

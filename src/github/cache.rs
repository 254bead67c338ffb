//! Conditional-request cache for GitHub reads.
//!
//! Train evaluation re-reads every candidate PR and its combined status on
//! each status event. [`ConditionalCache`] wraps a transport, attaches
//! `If-None-Match` to GETs whose URL it has seen before, and answers 304s
//! from the stored response. Conditional requests that come back 304 don't
//! count against the primary rate limit.
//!
//! One [`CacheState`] is shared by every repository. Its entries are keyed by
//! absolute URL only: a response cached under one set of credentials would
//! be served to another. The process runs under a single token so this never
//! happens today.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use http::{HeaderMap, HeaderValue};
use lru::LruCache;
use serde::Serialize;

use super::error::GitHubApiError;
use super::transport::{
    ApiRequest, ApiResponse, HttpTransport, RATE_LIMIT_REMAINING, RATE_LIMIT_TOTAL, header_str,
};

/// A cached GET response and the entity tag it was served with.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub etag: String,
    pub response: ApiResponse,
}

/// Point-in-time view of the cache for the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub rate_limit_total: Option<String>,
    pub rate_limit_remaining: Option<String>,
}

#[derive(Debug)]
struct Inner {
    entries: LruCache<String, CacheEntry>,
    rate_limit_total: Option<String>,
    rate_limit_remaining: Option<String>,
}

/// Process-wide cache contents and rate-limit telemetry.
///
/// All access goes through one mutex. Each operation holds it only for the
/// duration of a map lookup or update, never across a request.
#[derive(Debug)]
pub struct CacheState {
    inner: Mutex<Inner>,
}

impl CacheState {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                rate_limit_total: None,
                rate_limit_remaining: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock can't leave the map half-updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the entry for `url`, marking it most recently used.
    pub fn lookup(&self, url: &str) -> Option<CacheEntry> {
        self.lock().entries.get(url).cloned()
    }

    /// Inserts or refreshes the entry for `url`, evicting the least recently
    /// used entry when full.
    pub fn store(&self, url: &str, entry: CacheEntry) {
        if let Some((evicted, _)) = self.lock().entries.push(url.to_string(), entry) {
            if evicted != url {
                tracing::debug!(url = %evicted, "cache: evicted least recently used entry");
            }
        }
    }

    /// Overwrites the rate-limit telemetry from a response's headers.
    pub fn record_rate_limit(&self, headers: &HeaderMap) {
        let total = header_str(headers, RATE_LIMIT_TOTAL).map(str::to_string);
        let remaining = header_str(headers, RATE_LIMIT_REMAINING).map(str::to_string);

        let mut inner = self.lock();
        inner.rate_limit_total = total;
        inner.rate_limit_remaining = remaining;
    }

    pub fn contains(&self, url: &str) -> bool {
        self.lock().entries.contains(url)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            size: inner.entries.len(),
            capacity: inner.entries.cap().get(),
            rate_limit_total: inner.rate_limit_total.clone(),
            rate_limit_remaining: inner.rate_limit_remaining.clone(),
        }
    }
}

/// Transport decorator that makes GETs conditional.
pub struct ConditionalCache<T> {
    inner: T,
    state: Arc<CacheState>,
}

impl<T: HttpTransport> ConditionalCache<T> {
    pub fn new(inner: T, state: Arc<CacheState>) -> Self {
        Self { inner, state }
    }

    pub fn state(&self) -> &Arc<CacheState> {
        &self.state
    }
}

impl<T: HttpTransport> HttpTransport for ConditionalCache<T> {
    async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, GitHubApiError> {
        let url = request.url.clone();
        let is_get = request.is_get();

        let cached = if is_get {
            self.state.lookup(&url)
        } else {
            None
        };

        if let Some(entry) = &cached {
            match HeaderValue::from_str(&entry.etag) {
                Ok(etag) => {
                    tracing::debug!(url = %url, etag = %entry.etag, "cache: etag found");
                    request.headers.insert(http::header::IF_NONE_MATCH, etag);
                }
                Err(_) => {
                    tracing::warn!(url = %url, "cache: stored etag is not a valid header value");
                }
            }
        }

        match self.inner.send(request).await {
            Ok(response) => {
                self.state.record_rate_limit(&response.headers);

                if is_get {
                    if let Some(etag) = response.etag() {
                        tracing::debug!(url = %url, etag, "cache: storing");
                        self.state.store(
                            &url,
                            CacheEntry {
                                etag: etag.to_string(),
                                response: response.clone(),
                            },
                        );
                    }
                }

                Ok(response)
            }
            Err(err) => {
                if let Some(headers) = &err.headers {
                    self.state.record_rate_limit(headers);
                }

                match cached {
                    Some(entry) if err.is_not_modified() => {
                        tracing::debug!(url = %url, etag = %entry.etag, "cache: hit 304");
                        Ok(entry.response)
                    }
                    _ => Err(err),
                }
            }
        }
    }
}

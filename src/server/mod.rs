//! HTTP server for the steward bot.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries (returns 202 Accepted)
//! - `GET /health` - Returns 200 if server is running
//! - `GET /api/v1/repos` - Every repository's train, flags and decision log
//! - `GET /api/v1/repos/{owner}/{repo}` - One repository
//! - `POST /api/v1/repos/{owner}/{repo}/flags/{flag}` - Set or toggle a flag
//! - `POST /api/v1/code-freeze` - Set the code freeze for all repositories

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::effects::GitHubInterpreter;
use crate::github::CacheState;
use crate::train::TrainRegistry;
use crate::webhooks::WebhookSecret;

pub mod admin;
pub mod health;
pub mod webhook;

pub use health::health_handler;
pub use webhook::webhook_handler;

/// Shared application state, passed to handlers via axum's `State`.
pub struct AppState<I> {
    pub registry: Arc<TrainRegistry<I>>,
    /// Read for the cache statistics on the overview endpoint.
    pub cache: Arc<CacheState>,
    pub secret: WebhookSecret,
}

// Manual impl: a derive would require `I: Clone`.
impl<I> Clone for AppState<I> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            cache: self.cache.clone(),
            secret: self.secret.clone(),
        }
    }
}

impl<I: GitHubInterpreter> AppState<I> {
    pub fn new(registry: Arc<TrainRegistry<I>>, cache: Arc<CacheState>, secret: WebhookSecret) -> Self {
        Self {
            registry,
            cache,
            secret,
        }
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router<I: GitHubInterpreter>(app_state: AppState<I>) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler::<I>))
        .route("/health", get(health_handler))
        .route("/api/v1/repos", get(admin::list_repos::<I>))
        .route("/api/v1/repos/{owner}/{repo}", get(admin::get_repo::<I>))
        .route(
            "/api/v1/repos/{owner}/{repo}/flags/{flag}",
            post(admin::update_flag::<I>),
        )
        .route("/api/v1/code-freeze", post(admin::set_code_freeze::<I>))
        .with_state(app_state)
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tokio::time::timeout;
    use tower::ServiceExt;

    use crate::test_utils::{FakeGitHub, changeset};
    use crate::train::TrainConfig;
    use crate::types::{MergeableState, PrNumber, RepoId, StatusState};

    const SECRET: &str = "test-secret";

    struct Harness {
        github: FakeGitHub,
        state: AppState<FakeGitHub>,
    }

    impl Harness {
        fn new() -> Self {
            let github = FakeGitHub::new();
            let shared = github.clone();
            let config = TrainConfig {
                mutate: true,
                ..TrainConfig::default()
            };
            let registry = Arc::new(TrainRegistry::new(config, move |_| shared.clone()));
            let cache = Arc::new(CacheState::new(NonZeroUsize::new(10).unwrap()));
            let state = AppState::new(registry, cache, WebhookSecret::new(SECRET));
            Self { github, state }
        }

        fn router(&self) -> Router {
            build_router(self.state.clone())
        }

        async fn settle(&self, repo: &RepoId) {
            let controller = self.state.registry.get(repo).await.unwrap();
            timeout(Duration::from_secs(5), controller.drain())
                .await
                .unwrap();
        }
    }

    fn webhook(secret: &str, event_type: &str, body: &Value) -> Request<Body> {
        let body_bytes = serde_json::to_vec(body).unwrap();
        let signature = WebhookSecret::new(secret).sign(&body_bytes);

        Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json")
            .header("x-github-event", event_type)
            .header("x-github-delivery", "550e8400-e29b-41d4-a716-446655440000")
            .header("x-hub-signature-256", signature)
            .body(Body::from(body_bytes))
            .unwrap()
    }

    fn status_payload() -> Value {
        json!({
            "sha": "abc",
            "state": "success",
            "repository": { "name": "hello-world", "owner": { "login": "octocat" } }
        })
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn hello_world() -> RepoId {
        RepoId::new("octocat", "hello-world")
    }

    #[tokio::test]
    async fn health_returns_200() {
        let harness = Harness::new();
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();

        let response = harness.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn status_webhook_runs_the_train() {
        let harness = Harness::new();
        harness.github.add_pr(
            changeset(1, &["ready-to-merge"], "main", MergeableState::Clean),
            &[StatusState::Success],
        );
        harness.github.add_labeled_issue(PrNumber(1), true);

        let response = harness
            .router()
            .oneshot(webhook(SECRET, "status", &status_payload()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        harness.settle(&hello_world()).await;
        assert_eq!(harness.github.merged(), vec![PrNumber(1)]);
    }

    #[tokio::test]
    async fn invalid_signature_returns_401() {
        let harness = Harness::new();

        let response = harness
            .router()
            .oneshot(webhook("wrong-secret", "status", &status_payload()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(harness.state.registry.is_empty().await);
    }

    #[tokio::test]
    async fn missing_event_header_returns_400() {
        let harness = Harness::new();
        let body_bytes = serde_json::to_vec(&status_payload()).unwrap();
        let signature = WebhookSecret::new(SECRET).sign(&body_bytes);

        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("x-hub-signature-256", signature)
            .body(Body::from(body_bytes))
            .unwrap();

        let response = harness.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_signature_returns_400() {
        let harness = Harness::new();
        let request = Request::builder()
            .method("POST")
            .uri("/webhook")
            .header("x-github-event", "status")
            .body(Body::from(status_payload().to_string()))
            .unwrap();

        let response = harness.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ignored_and_malformed_events_are_accepted() {
        let harness = Harness::new();

        let push = harness
            .router()
            .oneshot(webhook(SECRET, "push", &json!({"ref": "refs/heads/main"})))
            .await
            .unwrap();
        assert_eq!(push.status(), StatusCode::ACCEPTED);

        let malformed = harness
            .router()
            .oneshot(webhook(SECRET, "status", &json!({"sha": "abc"})))
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::ACCEPTED);

        assert!(harness.state.registry.is_empty().await);
        assert!(harness.github.effects().is_empty());
    }

    #[tokio::test]
    async fn ping_registers_repository() {
        let harness = Harness::new();
        let ping = json!({
            "zen": "Practicality beats purity.",
            "repository": { "name": "hello-world", "owner": { "login": "octocat" } }
        });

        let response = harness
            .router()
            .oneshot(webhook(SECRET, "ping", &ping))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let request = Request::builder()
            .uri("/api/v1/repos/octocat/hello-world")
            .body(Body::empty())
            .unwrap();
        let response = harness.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let snapshot = json_body(response).await;
        assert_eq!(snapshot["repo"], "octocat/hello-world");
        assert_eq!(snapshot["enabled"], true);
        assert_eq!(snapshot["train"], json!([]));
        assert_eq!(snapshot["queue_size"], 0);
    }

    #[tokio::test]
    async fn unknown_repository_returns_404() {
        let harness = Harness::new();
        let request = Request::builder()
            .uri("/api/v1/repos/nobody/nothing")
            .body(Body::empty())
            .unwrap();

        let response = harness.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn overview_lists_repositories_and_cache() {
        let harness = Harness::new();
        harness
            .state
            .registry
            .controller(&RepoId::new("o", "b"))
            .await;
        harness
            .state
            .registry
            .controller(&RepoId::new("o", "a"))
            .await;

        let request = Request::builder()
            .uri("/api/v1/repos")
            .body(Body::empty())
            .unwrap();
        let response = harness.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let overview = json_body(response).await;
        assert_eq!(overview["repos"][0]["repo"], "o/a");
        assert_eq!(overview["repos"][1]["repo"], "o/b");
        assert_eq!(overview["cache"]["capacity"], 10);
        assert_eq!(overview["cache"]["size"], 0);
    }

    #[tokio::test]
    async fn flags_can_be_set_and_toggled() {
        let harness = Harness::new();
        let controller = harness.state.registry.controller(&hello_world()).await;

        let response = harness
            .router()
            .oneshot(post_json(
                "/api/v1/repos/octocat/hello-world/flags/mutation_enabled",
                json!({"value": false}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({"repo": "octocat/hello-world", "flag": "mutation_enabled", "value": false})
        );
        assert!(!controller.snapshot().mutation_enabled);

        let response = harness
            .router()
            .oneshot(post_json(
                "/api/v1/repos/octocat/hello-world/flags/enabled",
                json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!controller.snapshot().enabled);
    }

    #[tokio::test]
    async fn unknown_flag_returns_400() {
        let harness = Harness::new();
        harness.state.registry.controller(&hello_world()).await;

        let response = harness
            .router()
            .oneshot(post_json(
                "/api/v1/repos/octocat/hello-world/flags/merge_label",
                json!({"value": true}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn disabled_repository_ignores_webhooks() {
        let harness = Harness::new();
        harness.github.add_labeled_issue(PrNumber(1), true);
        let controller = harness.state.registry.controller(&hello_world()).await;
        controller.set_flag(crate::train::RepoFlag::Enabled, false);

        let response = harness
            .router()
            .oneshot(webhook(SECRET, "status", &status_payload()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        harness.settle(&hello_world()).await;
        assert!(harness.github.effects().is_empty());
    }

    #[tokio::test]
    async fn code_freeze_applies_everywhere() {
        let harness = Harness::new();
        harness.state.registry.controller(&RepoId::new("o", "a")).await;
        harness.state.registry.controller(&RepoId::new("o", "b")).await;

        let response = harness
            .router()
            .oneshot(post_json(
                "/api/v1/code-freeze",
                json!({"enforce": true, "branch": "release"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["repos"], 2);

        for snapshot in harness.state.registry.snapshots().await {
            assert!(snapshot.enforce_code_freeze);
            assert_eq!(snapshot.code_freeze_branch, "release");
        }
    }
}

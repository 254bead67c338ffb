use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use steward_bot::config::Config;
use steward_bot::github::{CacheState, ConditionalCache, OctocrabTransport, RepoClient};
use steward_bot::server::{AppState, build_router};
use steward_bot::train::TrainRegistry;
use steward_bot::webhooks::WebhookSecret;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "steward_bot=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    tracing::info!(?config, "Starting steward-bot");

    let cache = Arc::new(CacheState::new(config.cache_capacity));
    let octocrab = OctocrabTransport::from_token(config.github_token.clone())
        .context("failed to build GitHub client")?;
    let transport = Arc::new(ConditionalCache::new(octocrab, cache.clone()));

    let api_url = config.api_url.clone();
    let registry = Arc::new(TrainRegistry::new(config.train.clone(), move |repo| {
        RepoClient::new(transport.clone(), repo.clone(), api_url.clone())
    }));

    let app_state = AppState::new(
        registry,
        cache,
        WebhookSecret::new(config.webhook_secret.clone()),
    );
    let app = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!("listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod device;
mod handlers;
mod relay;

use config::RelayConfig;
use relay::SubscriptionRelay;

#[derive(Clone)]
pub struct AppState {
    pub relay: SubscriptionRelay,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marzgate_sub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let config = RelayConfig::load()?;
    tracing::info!("Subscription relay starting...");
    tracing::info!("Upstream panel: {}", config.upstream_url);
    tracing::info!("Upstream timeout: {}s", config.upstream_timeout_secs);
    if !config.verify_tls {
        tracing::warn!("Upstream TLS certificate verification is DISABLED");
    }

    // The relay is built once and handed to the handlers through state.
    let relay = SubscriptionRelay::new(
        config.upstream_url.clone(),
        config.verify_tls,
        Duration::from_secs(config.upstream_timeout_secs),
    );
    let state = AppState { relay };

    // Build router
    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/sub/{token}",
            get(handlers::subscription::subscription_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    tracing::info!("Relay listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

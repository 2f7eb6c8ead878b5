use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod config;
mod constants;
mod error;
mod integrations;
mod models;
mod network;
mod services;
mod wallet;

use config::Config;
use constants::API_VERSION;
use services::{EcosystemStore, FileStorage, TokenBalanceReader};
use wallet::{ProviderDiscovery, WalletProviderAdapter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "truth_ecosystem=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    config.validate()?;

    tracing::info!("Starting Truth ecosystem service");
    tracing::info!("Environment: {}", config.environment);
    tracing::info!("API Version: {}", API_VERSION);

    let network = network::resolve_network(&config.site_hostname, config.is_production());
    tracing::info!(
        "Target network: {} ({}) for host {}",
        network.chain_name,
        network.chain_id(),
        config.site_hostname
    );

    // Wallet + state store
    let discovery =
        ProviderDiscovery::new(config.wallet_environment()?, config.preferred_wallet()?);
    let adapter = Arc::new(WalletProviderAdapter::new(discovery, network.clone()));
    let storage = Arc::new(FileStorage::new(&config.state_dir)?);
    let store = EcosystemStore::load(
        storage,
        adapter,
        TokenBalanceReader::default(),
        config.tokens()?,
    );

    let mut sync =
        services::start_background_services(store.clone(), config.sync_intervals()).await;

    let app_state = api::AppState {
        store,
        config: config.clone(),
        network,
    };
    let app = build_router(app_state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if sync.is_running() {
        tracing::info!("Server stopped; cancelling sync tasks");
    }
    sync.stop();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

fn build_router(state: api::AppState) -> Router {
    // CORS configuration
    let cors = cors_from_config(&state.config);

    Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        // Network + state
        .route("/api/network", get(api::network::get_network))
        .route("/api/ecosystem", get(api::ecosystem::get_ecosystem))
        .route("/api/navigate", post(api::ecosystem::navigate))
        // Wallet session
        .route("/api/wallet/connect", post(api::wallet::connect_wallet))
        .route("/api/wallet/disconnect", post(api::wallet::disconnect_wallet))
        .route("/api/wallet/refresh", post(api::wallet::refresh_balances))
        // Tokens
        .route("/api/tokens", get(api::tokens::list_tokens))
        .fallback(api::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_from_config(config: &Config) -> CorsLayer {
    let raw = config.cors_allowed_origins.trim();
    if raw.is_empty() || raw == "*" {
        return CorsLayer::very_permissive();
    }

    let allowed: Vec<HeaderValue> = raw
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<HeaderValue>().ok())
        .collect();

    if allowed.is_empty() {
        tracing::warn!("No valid CORS origins parsed; falling back to permissive");
        return CorsLayer::very_permissive();
    }

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

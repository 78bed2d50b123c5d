//! Options Market Data Handler
//!
//! Loads the instrument catalog, subscribes to order book and index streams,
//! and keeps the in-memory market state current for the session duration.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use market_data::{
    AppState, Config, DispatchMetrics, InstrumentCatalog, MarketState, WebSocketManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting Options Market Data Handler");

    // Load configuration
    let config = Arc::new(Config::load()?);
    info!(assets = ?config.assets, ws = %config.ws_endpoint, "Configuration loaded");

    // Resolve the instruments to subscribe
    let catalog = InstrumentCatalog::new(&config.rest_endpoint);
    let instruments = catalog.fetch_active_instruments(&config.assets).await?;
    info!(instruments = instruments.len(), "Active instruments resolved");

    let state = Arc::new(AppState {
        market: Arc::new(MarketState::new()),
        metrics: DispatchMetrics::new()?,
        config: config.clone(),
    });

    // Start health check server
    let health_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_state).await {
            warn!(error = %e, "Health server error");
        }
    });

    let mut ws_manager = WebSocketManager::new(state, instruments);
    ws_manager.run().await?;

    info!("Market data handler stopped");
    Ok(())
}

/// Start HTTP server for health checks and metrics
async fn start_health_server(state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], state.config.health_port));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!(addr = %addr, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "component": "market-data",
        "order_books": state.market.order_books.len().await,
        "index_prices": state.market.index_prices.len().await,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, (StatusCode, String)> {
    state
        .metrics
        .encode()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

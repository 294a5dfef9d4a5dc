//! Gateway Observatory Backend Server
//!
//! Monitors a decentralized network of gateway nodes: ingests the
//! ledger-declared gateway listing, probes each reachable gateway over
//! HTTP, resolves a normalized operational status, enriches it with
//! geolocation and derives network-wide decentralization metrics.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use gateway_observatory::app_state::AppState;
use gateway_observatory::config::ObserverConfig;
use gateway_observatory::routes;
use gateway_observatory::services::geo::HttpGeoProvider;
use gateway_observatory::services::ledger::HttpLedgerClient;
use gateway_observatory::services::pipeline::Pipeline;
use gateway_observatory::services::probe::{HttpProbeTransport, ProbeRunner, RetryPolicy};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let config = ObserverConfig::from_env();

    let ledger = Arc::new(HttpLedgerClient::new(
        config.ledger_api_url.clone(),
        config.probe_timeout,
    )?);
    let geo = Arc::new(HttpGeoProvider::new(
        config.geo_api_url.clone(),
        config.probe_timeout,
    )?);
    let prober = Arc::new(ProbeRunner::new(
        Arc::new(HttpProbeTransport::new(config.probe_timeout)?),
        config.probe_cache_ttl,
        RetryPolicy {
            max_retries: config.probe_max_retries,
        },
    ));
    let pipeline = Arc::new(Pipeline::new(
        ledger,
        geo,
        prober,
        config.max_concurrent_probes,
    ));
    let state = AppState::new(pipeline);

    // Create the app router
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(routes::gateway_routes())
        .merge(routes::metrics_routes())
        .layer(build_cors_layer())
        .with_state(state);

    // Get port from environment or default to 3001
    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3001".to_string())
        .parse::<u16>()?;

    let addr = SocketAddr::from(([127, 0, 0, 1], port));

    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Gateway Observatory API Server"
}

async fn health_check() -> &'static str {
    "OK"
}

fn build_cors_layer() -> CorsLayer {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .split(',')
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(false)
}

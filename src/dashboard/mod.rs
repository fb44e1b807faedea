//! Dashboard: Axum web server exposing the club ledger as a JSON API.
//!
//! CORS enabled for a locally served front end.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use routes::AppState;

/// Run the dashboard server until the shutdown future resolves.
pub async fn serve(
    state: AppState,
    port: u16,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Dashboard listening on http://localhost:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Dashboard server error")
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/summary", get(routes::get_summary))
        .route("/api/members", get(routes::get_members))
        .route("/api/holdings", get(routes::get_holdings))
        .route(
            "/api/contributions",
            get(routes::get_contributions).post(routes::post_contribution),
        )
        .route("/api/contributions/weekly", post(routes::post_weekly_round))
        .route(
            "/api/transactions",
            get(routes::get_transactions).post(routes::post_transaction),
        )
        .route("/api/weekly-summary", get(routes::get_weekly_summary))
        .route("/api/export/:file", get(routes::get_export))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

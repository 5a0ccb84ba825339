// Copyright (c) 2026 SOLARE S.R.O.
//
// This file is part of WattCard.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};
use wattcard_core::{DateRange, EntityValueCard, HostContext, SharedRangeSelection};

/// Application state for web handlers
#[derive(Clone, Debug)]
pub struct AppState {
    pub card: Arc<EntityValueCard>,
    pub host: Arc<HostContext>,
    pub selection: Arc<SharedRangeSelection>,
}

/// Start the web server exposing the card over HTTP
///
/// # Arguments
/// * `card` - The card whose value and lifecycle state are served
/// * `host` - Host context backing the health endpoint
/// * `selection` - Range-selection service fed by `POST /range`
/// * `port` - Port to listen on (8099 for HA Ingress)
///
/// # Routes
/// * `GET /value` - current card snapshot as JSON; drives card init
/// * `GET /health` - plain OK/DEGRADED/ERROR health probe
/// * `POST /range` - publish a date range to all subscribed cards
///
/// # Errors
/// Returns error if server fails to bind or serve
pub async fn start_web_server(
    card: Arc<EntityValueCard>,
    host: Arc<HostContext>,
    selection: Arc<SharedRangeSelection>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app_state = AppState {
        card,
        host,
        selection,
    };

    let app = Router::new()
        .route("/value", get(value_handler))
        .route("/health", get(health_handler))
        .route("/range", post(range_handler))
        .layer(CorsLayer::permissive()) // Allow HA Ingress
        .with_state(app_state);

    let addr = format!("0.0.0.0:{port}");
    info!("🌐 Starting card API on {addr}");
    info!("📱 Card value: http://localhost:{}/value", port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Card snapshot endpoint - drives initialization on every request, which
/// retries a failed init and re-attaches a disposed card
async fn value_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    debug!("Card value requested");
    app_state.card.ensure_initialized().await;
    Json(app_state.card.snapshot())
}

/// Health check endpoint
async fn health_handler(State(app_state): State<AppState>) -> impl IntoResponse {
    let states = app_state.host.states().health_check().await;
    let statistics = app_state.host.statistics().health_check().await;

    match (states, statistics) {
        (Ok(true), Ok(true)) => (axum::http::StatusCode::OK, "OK"),
        (Ok(false), Ok(_)) | (Ok(_), Ok(false)) => {
            (axum::http::StatusCode::SERVICE_UNAVAILABLE, "DEGRADED")
        }
        (Err(_), _) | (_, Err(_)) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, "ERROR"),
    }
}

/// Range publication endpoint - the dashboard's date selector posts here
async fn range_handler(
    State(app_state): State<AppState>,
    Json(range): Json<DateRange>,
) -> impl IntoResponse {
    info!(
        "📅 Range update: {} to {}",
        range.start.to_rfc3339(),
        range
            .end
            .map_or_else(|| "now".to_owned(), |end| end.to_rfc3339())
    );
    app_state.selection.publish(&range);
    axum::http::StatusCode::NO_CONTENT
}

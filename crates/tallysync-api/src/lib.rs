//! HTTP API server
//!
//! Two JSON endpoints for the dashboard client:
//! - `GET /api/health`: liveness probe, unauthenticated
//! - `GET /api/dashboard-data`: aggregated snapshot, guarded by the
//!   `X-API-Key` header
//!
//! Reads go straight to the store; they may run concurrently with an
//! in-progress extraction cycle and observe either the pre- or post-replace
//! account set.

pub mod error;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use tallysync_config::Config;
use tallysync_core::{SnapshotSummary, Store, StoredAccount};

pub use error::ApiError;

const API_KEY_HEADER: &str = "x-api-key";

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub config: Config,
}

/// Payload for `GET /api/dashboard-data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub summary: SnapshotSummary,
    pub debtors: Vec<StoredAccount>,
    pub creditors: Vec<StoredAccount>,
    pub timestamp: String,
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.allowed_origins);

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/dashboard-data", get(dashboard_data))
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint, open to anyone
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "database_exists": state.store.exists(),
    }))
}

/// Aggregated dashboard snapshot, guarded by the API key header
async fn dashboard_data(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DashboardResponse>, ApiError> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());
    if presented != Some(state.config.server.api_key.as_str()) {
        return Err(ApiError::Unauthorized);
    }

    let snapshot = state.store.snapshot().map_err(|e| {
        log::error!("database query error: {}", e);
        ApiError::Storage
    })?;

    Ok(Json(DashboardResponse {
        summary: snapshot.summary,
        debtors: snapshot.debtors,
        creditors: snapshot.creditors,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// CORS layer from the configured allow-list. A literal `*` entry (the
/// default) switches to a permissive policy.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                log::warn!("ignoring unparseable CORS origin: {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the HTTP server
///
/// Binds on all interfaces at the configured port and serves until the
/// shutdown channel flips, then drains gracefully.
pub async fn start_server(
    config: Config,
    store: Arc<Store>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ApiError> {
    let addr = format!("0.0.0.0:{}", config.server.port);
    let router = create_router(AppState { store, config });

    let listener = TcpListener::bind(&addr).await?;
    log::info!("API server listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
            log::info!("API server shutting down");
        })
        .await?;

    Ok(())
}

// ==================== Tests ====================

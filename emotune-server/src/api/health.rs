//! Liveness and database connectivity

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use emotune_common::db;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "emotune-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /
///
/// Round-trips a query to the catalog database.
pub async fn database_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match db::ping(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Database connection successful" })),
        ),
        Err(e) => {
            error!("Database ping failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "message": format!("Database connection failed: {}", e) })),
            )
        }
    }
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(database_check))
        .route("/health", get(health_check))
}

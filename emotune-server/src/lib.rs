//! emotune-server library
//!
//! Music catalog HTTP service with selfie-based mood detection.

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    Router,
};
use emotune_common::api::TokenKeys;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

pub mod api;
pub mod emotion;
pub mod error;
pub mod storage;

use emotion::EmotionClassifier;
use storage::MediaStorage;

/// Largest accepted request body (selfies and audio uploads)
pub const BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Catalog database pool
    pub db: SqlitePool,
    /// Bearer token signing and validation
    pub tokens: TokenKeys,
    pub classifier: Arc<dyn EmotionClassifier>,
    pub storage: Arc<dyn MediaStorage>,
    /// bcrypt cost for new password hashes
    pub password_cost: u32,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        tokens: TokenKeys,
        classifier: Arc<dyn EmotionClassifier>,
        storage: Arc<dyn MediaStorage>,
        password_cost: u32,
    ) -> Self {
        Self {
            db,
            tokens,
            classifier,
            storage,
            password_cost,
        }
    }
}

/// Build application router
///
/// Auth is enforced per handler through the `AuthUser` and `AdminUser`
/// extractors rather than a route layer.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::music_routes())
        .merge(api::user_routes())
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS for the browser frontend; credentials are allowed, so origins must be explicit
pub fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = allowed_origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o).map_err(|e| anyhow::anyhow!("invalid CORS origin {:?}: {}", o, e))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}

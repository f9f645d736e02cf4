//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Liveness probe.
///
/// Does not contact the OAuth2 authority; an unreachable authority shows
/// up as 500s on protected routes instead.
///
/// ```json
/// {"status": "healthy", "validator": "rest", "cache_enabled": true}
/// ```
#[instrument(skip_all, name = "authz.handlers.health")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        validator: state.config.validator.to_string(),
        cache_enabled: state.oauth2.cache().is_some(),
    })
}

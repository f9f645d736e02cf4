//! Response models for the authorization service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Health check response.
///
/// Returned by the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service health status.
    pub status: String,

    /// Configured validator kind.
    pub validator: String,

    /// Whether validation results are cached.
    pub cache_enabled: bool,
}

/// Response for `/api/v1/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    /// Profile information of the token owner.
    pub profile: Map<String, Value>,
}

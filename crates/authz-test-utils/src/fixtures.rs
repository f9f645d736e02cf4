//! Validation response and token-info fixtures.

use chrono::{Duration, Utc};
use oauth2_authz::auth::ValidationResponse;
use serde_json::{json, Map, Value};
use std::collections::HashSet;

/// Build a scope set from string slices.
pub fn scope_set(scopes: &[&str]) -> HashSet<String> {
    scopes.iter().map(|s| s.to_string()).collect()
}

/// Build a profile map from key/value pairs.
pub fn profile(pairs: &[(&str, &str)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
        .collect()
}

/// A response valid for five minutes with the given scopes and no profile.
pub fn valid_response(scopes: &[&str]) -> ValidationResponse {
    valid_response_for(scopes, Duration::minutes(5))
}

/// A response valid for `ttl` with the given scopes.
pub fn valid_response_for(scopes: &[&str], ttl: Duration) -> ValidationResponse {
    ValidationResponse::new(Utc::now() + ttl, Map::new(), scope_set(scopes))
}

/// A response that expired one second ago but still carries scopes.
pub fn expired_response(scopes: &[&str]) -> ValidationResponse {
    ValidationResponse::new(Utc::now() - Duration::seconds(1), Map::new(), scope_set(scopes))
}

/// Token-info body for an active token with a space-delimited scope.
pub fn token_info_body(expires_in: i64, scopes: &[&str]) -> Value {
    json!({
        "expires_in": expires_in,
        "scope": scopes.join(" "),
    })
}

/// Token-info body reporting a rejected token.
pub fn token_info_error_body() -> Value {
    json!({
        "error": "invalid_token",
        "error_description": "The access token provided is expired, revoked, malformed, or invalid",
    })
}

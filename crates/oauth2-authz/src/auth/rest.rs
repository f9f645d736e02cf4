//! REST-backed access-token validator.
//!
//! Validates tokens against an OAuth2 token-info endpoint and, when
//! configured, fetches profile attributes from a user-info endpoint.
//!
//! # Token-info contract
//!
//! `GET {token_info_endpoint}?access_token={token}` returning JSON:
//!
//! - `error` (optional) - presence means the token is invalid
//! - `expires_in` - remaining lifetime in seconds (integer)
//! - `scope` - space-delimited string or array of strings
//!
//! A 4xx status means the authority rejected the token, which is a normal
//! invalid response. 5xx statuses and transport failures are errors.
//!
//! # Security
//!
//! - The token only travels in the query string and Authorization header
//! - reqwest errors are stripped of their URL before logging, since the
//!   token-info URL carries the token

use crate::auth::validator::{AccessTokenValidator, ValidationResponse};
use crate::config::{Config, ConfigError};
use crate::errors::ValidatorError;
use crate::observability::metrics::record_token_validation;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Query parameter carrying the token on token-info calls.
const ACCESS_TOKEN_QUERY_PARAM: &str = "access_token";

/// Connect timeout for validation calls in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Shapes accepted for the `scope` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeField {
    Delimited(String),
    List(Vec<String>),
}

/// Validator backed by token-info and user-info HTTP endpoints.
pub struct RestAccessTokenValidator {
    /// HTTP client with configured timeouts.
    client: Client,

    /// Token-info endpoint.
    token_info_endpoint: Url,

    /// Optional user-info endpoint.
    user_info_endpoint: Option<Url>,
}

impl RestAccessTokenValidator {
    /// Create a validator with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEndpoint` if an endpoint is not a URL,
    /// or `ConfigError::HttpClient` if the client cannot be built.
    pub fn new(
        token_info_endpoint: &str,
        user_info_endpoint: Option<&str>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Self::with_client(client, token_info_endpoint, user_info_endpoint)
    }

    /// Create a validator using an existing HTTP client.
    pub fn with_client(
        client: Client,
        token_info_endpoint: &str,
        user_info_endpoint: Option<&str>,
    ) -> Result<Self, ConfigError> {
        let token_info_endpoint = parse_url("token-info", token_info_endpoint)?;
        let user_info_endpoint = user_info_endpoint
            .map(|endpoint| parse_url("user-info", endpoint))
            .transpose()?;

        Ok(Self {
            client,
            token_info_endpoint,
            user_info_endpoint,
        })
    }

    /// Build from service configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no token-info endpoint is configured.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let token_info_endpoint = config.token_info_endpoint.as_deref().ok_or_else(|| {
            ConfigError::MissingEnvVar("OAUTH2_TOKEN_INFO_ENDPOINT".to_string())
        })?;

        Self::new(
            token_info_endpoint,
            config.user_info_endpoint.as_deref(),
            Duration::from_secs(config.http_timeout_seconds),
        )
    }

    /// Token-info call, followed by user-info for tokens that are still valid.
    async fn introspect(&self, token: &str) -> Result<ValidationResponse, ValidatorError> {
        let token_info = self.fetch_token_info(token).await?;

        let Some(endpoint) = &self.user_info_endpoint else {
            return Ok(token_info);
        };
        if !token_info.is_token_valid() {
            return Ok(token_info);
        }

        match self.fetch_user_info(endpoint, token).await? {
            Some(profile) => Ok(token_info.with_profile_info(profile)),
            None => Ok(ValidationResponse::invalid()),
        }
    }

    /// Call the token-info endpoint.
    async fn fetch_token_info(&self, token: &str) -> Result<ValidationResponse, ValidatorError> {
        let mut url = self.token_info_endpoint.clone();
        url.query_pairs_mut()
            .append_pair(ACCESS_TOKEN_QUERY_PARAM, token);

        let response = self.client.get(url).send().await.map_err(|e| {
            let e = e.without_url();
            warn!(target: "authz.auth.rest", error = %e, "Token-info request failed");
            ValidatorError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status.is_client_error() {
            debug!(target: "authz.auth.rest", status = %status, "Token-info endpoint rejected token");
            return Ok(ValidationResponse::invalid());
        }
        if !status.is_success() {
            warn!(target: "authz.auth.rest", status = %status, "Token-info endpoint returned error");
            return Err(ValidatorError::UpstreamStatus(status.as_u16()));
        }

        let body: Value = response.json().await.map_err(|e| {
            let e = e.without_url();
            warn!(target: "authz.auth.rest", error = %e, "Failed to parse token-info response");
            ValidatorError::MalformedResponse("token-info response is not valid JSON".to_string())
        })?;

        parse_token_info(body, Utc::now())
    }

    /// Call the user-info endpoint.
    ///
    /// Returns `Ok(None)` if the endpoint rejected the token.
    async fn fetch_user_info(
        &self,
        endpoint: &Url,
        token: &str,
    ) -> Result<Option<Map<String, Value>>, ValidatorError> {
        let response = self
            .client
            .get(endpoint.clone())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                let e = e.without_url();
                warn!(target: "authz.auth.rest", error = %e, "User-info request failed");
                ValidatorError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status.is_client_error() {
            debug!(target: "authz.auth.rest", status = %status, "User-info endpoint rejected token");
            return Ok(None);
        }
        if !status.is_success() {
            warn!(target: "authz.auth.rest", status = %status, "User-info endpoint returned error");
            return Err(ValidatorError::UpstreamStatus(status.as_u16()));
        }

        let body: Value = response.json().await.map_err(|e| {
            let e = e.without_url();
            warn!(target: "authz.auth.rest", error = %e, "Failed to parse user-info response");
            ValidatorError::MalformedResponse("user-info response is not valid JSON".to_string())
        })?;

        match body {
            Value::Object(profile) => Ok(Some(profile)),
            _ => Err(ValidatorError::MalformedResponse(
                "user-info response is not a JSON object".to_string(),
            )),
        }
    }
}

#[async_trait::async_trait]
impl AccessTokenValidator for RestAccessTokenValidator {
    #[instrument(skip_all, name = "authz.auth.rest.validate")]
    async fn validate(&self, token: &str) -> Result<ValidationResponse, ValidatorError> {
        let start = Instant::now();

        let result = self.introspect(token).await;

        let status = match &result {
            Ok(response) if response.is_token_valid() => "valid",
            Ok(_) => "invalid",
            Err(_) => "error",
        };
        record_token_validation(status, start.elapsed());

        result
    }
}

fn parse_url(name: &str, endpoint: &str) -> Result<Url, ConfigError> {
    Url::parse(endpoint).map_err(|e| {
        ConfigError::InvalidEndpoint(format!("{} endpoint must be an absolute URL: {}", name, e))
    })
}

/// Interpret a token-info response body observed at `now`.
///
/// # Errors
///
/// Returns `ValidatorError::MalformedResponse` if the body is not an object,
/// `expires_in` is missing or not an integer, or `scope` has another shape.
pub fn parse_token_info(
    body: Value,
    now: DateTime<Utc>,
) -> Result<ValidationResponse, ValidatorError> {
    let Value::Object(fields) = body else {
        return Err(ValidatorError::MalformedResponse(
            "token-info response is not a JSON object".to_string(),
        ));
    };

    if fields.contains_key("error") {
        return Ok(ValidationResponse::invalid());
    }

    let expires_in = fields
        .get("expires_in")
        .ok_or_else(|| {
            ValidatorError::MalformedResponse("token-info response missing expires_in".to_string())
        })?
        .as_i64()
        .ok_or_else(|| {
            ValidatorError::MalformedResponse("expires_in is not an integer".to_string())
        })?;

    let expires_at = TimeDelta::try_seconds(expires_in)
        .and_then(|lifetime| now.checked_add_signed(lifetime))
        .ok_or_else(|| {
            ValidatorError::MalformedResponse("expires_in is out of range".to_string())
        })?;

    let scopes = match fields.get("scope") {
        None | Some(Value::Null) => HashSet::new(),
        Some(scope) => normalize_scope(scope)?,
    };

    Ok(ValidationResponse::new(expires_at, Map::new(), scopes))
}

/// Normalize a `scope` value to a set of scope names.
///
/// Accepts a space-delimited string or an array of strings.
pub fn normalize_scope(scope: &Value) -> Result<HashSet<String>, ValidatorError> {
    let field: ScopeField = serde_json::from_value(scope.clone()).map_err(|_| {
        ValidatorError::MalformedResponse(
            "scope must be a string or an array of strings".to_string(),
        )
    })?;

    let scopes = match field {
        ScopeField::Delimited(value) => value
            .split_whitespace()
            .map(str::to_string)
            .collect(),
        ScopeField::List(values) => values
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    };

    Ok(scopes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scopes(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_error_field_means_invalid() {
        let response = parse_token_info(json!({"error": "invalid_token"}), Utc::now()).unwrap();

        assert_eq!(response, ValidationResponse::invalid());
        assert_eq!(response.expires_at().timestamp(), 0);
    }

    #[test]
    fn test_error_field_wins_over_other_fields() {
        let response = parse_token_info(
            json!({"error": "ERROR", "expires_in": 3600, "scope": "read"}),
            Utc::now(),
        )
        .unwrap();

        assert!(!response.is_token_valid());
        assert!(response.scopes().is_empty());
    }

    #[test]
    fn test_expiry_relative_to_observation_time() {
        let now = Utc::now();
        let response =
            parse_token_info(json!({"expires_in": 10, "scope": "A B C"}), now).unwrap();

        assert_eq!(response.expires_at(), now + TimeDelta::seconds(10));
        assert!(response.is_valid_at(now));
        assert_eq!(response.scopes(), &scopes(&["A", "B", "C"]));
        assert!(response.profile_info().is_empty());
    }

    #[test]
    fn test_negative_expiry_keeps_scopes() {
        let response =
            parse_token_info(json!({"expires_in": -1, "scope": "A B C"}), Utc::now()).unwrap();

        assert!(!response.is_token_valid());
        assert_eq!(response.scopes().len(), 3);
    }

    #[test]
    fn test_missing_scope_is_empty_set() {
        let response = parse_token_info(json!({"expires_in": 60}), Utc::now()).unwrap();
        assert!(response.scopes().is_empty());
        assert!(response.is_token_valid());
    }

    #[test]
    fn test_missing_expires_in_is_malformed() {
        let result = parse_token_info(json!({"scope": "read"}), Utc::now());
        assert!(
            matches!(result, Err(ValidatorError::MalformedResponse(msg)) if msg.contains("expires_in"))
        );
    }

    #[test]
    fn test_non_integer_expires_in_is_malformed() {
        let result = parse_token_info(json!({"expires_in": "3600"}), Utc::now());
        assert!(matches!(result, Err(ValidatorError::MalformedResponse(_))));
    }

    #[test]
    fn test_overflowing_expires_in_is_malformed() {
        let result = parse_token_info(json!({"expires_in": i64::MAX}), Utc::now());
        assert!(
            matches!(result, Err(ValidatorError::MalformedResponse(msg)) if msg.contains("out of range"))
        );
    }

    #[test]
    fn test_non_object_body_is_malformed() {
        let result = parse_token_info(json!(["expires_in", 10]), Utc::now());
        assert!(matches!(result, Err(ValidatorError::MalformedResponse(_))));
    }

    #[test]
    fn test_scope_array_matches_delimited_string() {
        let from_string = normalize_scope(&json!("read write")).unwrap();
        let from_array = normalize_scope(&json!(["read", "write"])).unwrap();

        assert_eq!(from_string, from_array);
        assert_eq!(from_string, scopes(&["read", "write"]));
    }

    #[test]
    fn test_scope_string_collapses_extra_whitespace() {
        let parsed = normalize_scope(&json!("  read\twrite  read ")).unwrap();
        assert_eq!(parsed, scopes(&["read", "write"]));
    }

    #[test]
    fn test_scope_rejects_other_shapes() {
        assert!(normalize_scope(&json!(42)).is_err());
        assert!(normalize_scope(&json!(["read", 7])).is_err());
        assert!(normalize_scope(&json!({"read": true})).is_err());
    }

    #[test]
    fn test_with_client_rejects_bad_endpoint() {
        let result = RestAccessTokenValidator::with_client(Client::new(), "not a url", None);
        assert!(matches!(result, Err(ConfigError::InvalidEndpoint(_))));

        let result = RestAccessTokenValidator::with_client(
            Client::new(),
            "https://auth.example.com/tokeninfo",
            Some("::"),
        );
        assert!(
            matches!(result, Err(ConfigError::InvalidEndpoint(msg)) if msg.contains("user-info"))
        );
    }

    #[test]
    fn test_from_config_requires_token_info_endpoint() {
        let config = Config {
            bind_address: "127.0.0.1:0".to_string(),
            validator: crate::auth::registry::ValidatorKind::Rest,
            token_info_endpoint: None,
            user_info_endpoint: None,
            required_scopes: HashSet::new(),
            cache_enabled: false,
            cache_size: 0,
            http_timeout_seconds: 5,
        };

        let result = RestAccessTokenValidator::from_config(&config);
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }
}

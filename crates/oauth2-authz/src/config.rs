//! OAuth2 authorization service configuration.
//!
//! Configuration is loaded from environment variables. Endpoint URLs are
//! validated at load time so a misconfigured service fails fast.

use crate::auth::registry::ValidatorKind;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::env;
use std::fmt;
use thiserror::Error;

/// Default HTTP bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default number of cached validation results.
pub const DEFAULT_CACHE_SIZE: i64 = 1000;

/// Default transport timeout for token-info and user-info calls.
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Upper bound for the transport timeout.
pub const MAX_HTTP_TIMEOUT_SECONDS: u64 = 120;

/// OAuth2 authorization service configuration.
#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Which validator implementation to build from the registry.
    pub validator: ValidatorKind,

    /// Token-info endpoint. Required for the REST validator.
    pub token_info_endpoint: Option<String>,

    /// Optional user-info endpoint for profile attributes.
    pub user_info_endpoint: Option<String>,

    /// Scopes every token must carry.
    pub required_scopes: HashSet<String>,

    /// Whether validation results are cached.
    pub cache_enabled: bool,

    /// Maximum cached entries. Values <= 0 disable the cache.
    pub cache_size: i64,

    /// Transport timeout for validation calls in seconds.
    pub http_timeout_seconds: u64,
}

/// Endpoints may embed credentials in userinfo, so they are shown by host only.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scopes: BTreeSet<&String> = self.required_scopes.iter().collect();
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("validator", &self.validator)
            .field(
                "token_info_endpoint",
                &self.token_info_endpoint.as_deref().map(redact_endpoint),
            )
            .field(
                "user_info_endpoint",
                &self.user_info_endpoint.as_deref().map(redact_endpoint),
            )
            .field("required_scopes", &scopes)
            .field("cache_enabled", &self.cache_enabled)
            .field("cache_size", &self.cache_size)
            .field("http_timeout_seconds", &self.http_timeout_seconds)
            .finish()
    }
}

fn redact_endpoint(endpoint: &str) -> String {
    match reqwest::Url::parse(endpoint) {
        Ok(url) => format!(
            "{}://{}{}",
            url.scheme(),
            url.host_str().unwrap_or("[unknown]"),
            url.path()
        ),
        Err(_) => "[INVALID]".to_string(),
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid endpoint configuration: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid validator configuration: {0}")]
    InvalidValidator(String),

    #[error("Unsupported validator: {0}")]
    UnsupportedValidator(String),

    #[error("Invalid cache configuration: {0}")]
    InvalidCache(String),

    #[error("Invalid HTTP timeout configuration: {0}")]
    InvalidHttpTimeout(String),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let validator = match vars.get("OAUTH2_VALIDATOR") {
            Some(value) => value.parse::<ValidatorKind>()?,
            None => ValidatorKind::Rest,
        };

        let token_info_endpoint =
            parse_endpoint(vars, "OAUTH2_TOKEN_INFO_ENDPOINT")?;
        if validator == ValidatorKind::Rest && token_info_endpoint.is_none() {
            return Err(ConfigError::MissingEnvVar(
                "OAUTH2_TOKEN_INFO_ENDPOINT".to_string(),
            ));
        }

        let user_info_endpoint = parse_endpoint(vars, "OAUTH2_USER_INFO_ENDPOINT")?;

        let required_scopes = vars
            .get("OAUTH2_REQUIRED_SCOPES")
            .map(|value| parse_scope_list(value))
            .unwrap_or_default();

        let cache_enabled = if let Some(value_str) = vars.get("OAUTH2_CACHE_ENABLED") {
            match value_str.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    return Err(ConfigError::InvalidCache(format!(
                        "OAUTH2_CACHE_ENABLED must be true or false, got '{}'",
                        value_str
                    )))
                }
            }
        } else {
            true
        };

        // Non-positive sizes are accepted and treated as "cache disabled"
        let cache_size = if let Some(value_str) = vars.get("OAUTH2_CACHE_SIZE") {
            value_str.trim().parse::<i64>().map_err(|e| {
                ConfigError::InvalidCache(format!(
                    "OAUTH2_CACHE_SIZE must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?
        } else {
            DEFAULT_CACHE_SIZE
        };

        let http_timeout_seconds =
            if let Some(value_str) = vars.get("OAUTH2_HTTP_TIMEOUT_SECONDS") {
                let value: u64 = value_str.trim().parse().map_err(|e| {
                    ConfigError::InvalidHttpTimeout(format!(
                        "OAUTH2_HTTP_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidHttpTimeout(
                        "OAUTH2_HTTP_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                if value > MAX_HTTP_TIMEOUT_SECONDS {
                    return Err(ConfigError::InvalidHttpTimeout(format!(
                        "OAUTH2_HTTP_TIMEOUT_SECONDS must not exceed {} seconds, got {}",
                        MAX_HTTP_TIMEOUT_SECONDS, value
                    )));
                }

                value
            } else {
                DEFAULT_HTTP_TIMEOUT_SECONDS
            };

        Ok(Config {
            bind_address,
            validator,
            token_info_endpoint,
            user_info_endpoint,
            required_scopes,
            cache_enabled,
            cache_size,
            http_timeout_seconds,
        })
    }
}

/// Reads an optional endpoint URL. Empty values count as unset.
fn parse_endpoint(
    vars: &HashMap<String, String>,
    key: &str,
) -> Result<Option<String>, ConfigError> {
    let Some(value) = vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };

    let url = reqwest::Url::parse(value).map_err(|e| {
        ConfigError::InvalidEndpoint(format!("{} must be an absolute URL: {}", key, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidEndpoint(format!(
            "{} must use http or https, got '{}'",
            key,
            url.scheme()
        )));
    }

    Ok(Some(value.to_string()))
}

/// Splits a scope list on whitespace and commas.
pub fn parse_scope_list(value: &str) -> HashSet<String> {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

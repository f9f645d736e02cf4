//! Error types for the OAuth2 authorization service.
//!
//! Three layers of errors exist:
//!
//! - `ValidatorError` - the remote validation call could not complete
//! - `AuthorizationError` - the decision function itself failed
//! - `AuthzError` - HTTP-facing error with status code mapping
//!
//! A denied token is not an error; it is a successful
//! `AuthorizationResult::Deny`. Error messages returned to clients are
//! intentionally generic. Actual causes are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Realm advertised in `WWW-Authenticate` challenges.
pub const AUTH_REALM: &str = "oauth2-authz";

/// Failure of a remote token validation call.
///
/// Distinct from "token is invalid", which validators report as a
/// successful `ValidationResponse` with zero validity.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream returned status {0}")]
    UpstreamStatus(u16),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Failure of the authorization decision function.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("Token validation failed: {0}")]
    Validation(#[from] ValidatorError),
}

/// HTTP-facing error type.
///
/// Maps to HTTP status codes:
/// - InvalidToken: 401 Unauthorized
/// - InsufficientScope: 403 Forbidden
/// - Authorization, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Insufficient scope: {0}")]
    InsufficientScope(String),

    #[error(transparent)]
    Authorization(#[from] AuthorizationError),

    #[error("Internal server error")]
    Internal,
}

impl AuthzError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            AuthzError::InvalidToken(_) => 401,
            AuthzError::InsufficientScope(_) => 403,
            AuthzError::Authorization(_) | AuthzError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        let (status, code, message, challenge) = match &self {
            AuthzError::InvalidToken(reason) => (
                StatusCode::UNAUTHORIZED,
                "INVALID_TOKEN",
                reason.clone(),
                Some("invalid_token"),
            ),
            AuthzError::InsufficientScope(reason) => (
                StatusCode::FORBIDDEN,
                "INSUFFICIENT_SCOPE",
                reason.clone(),
                Some("insufficient_scope"),
            ),
            AuthzError::Authorization(err) => {
                // Log actual cause server-side, return generic message to client
                tracing::error!(target: "authz.errors", error = %err, "Authorization failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUTHORIZATION_ERROR",
                    "Unable to validate access token".to_string(),
                    None,
                )
            }
            AuthzError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if let Some(error_code) = challenge {
            let challenge_value = format!("Bearer realm=\"{AUTH_REALM}\", error=\"{error_code}\"");
            if let Ok(header_value) = challenge_value.parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

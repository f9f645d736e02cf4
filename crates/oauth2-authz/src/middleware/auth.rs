//! OAuth2 authorization middleware for protected routes.
//!
//! Extracts the bearer token from the Authorization header, runs the
//! `OAuth2Module`, and on permit stores the resulting
//! `AuthorizationContext` in request extensions for handlers.

use crate::auth::{
    extract_bearer_token, AuthorizationContext, AuthorizationResult, DenialReason, OAuth2Module,
};
use crate::errors::AuthzError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tracing::instrument;

/// State for the authorization middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Shared authorization module (and its cache).
    pub module: Arc<OAuth2Module>,
}

/// Authorization middleware.
///
/// # Response
///
/// - 401 with `WWW-Authenticate` if the token is missing, invalid or expired
/// - 403 with `WWW-Authenticate` if the token lacks required scopes
/// - 500 if the token could not be validated
/// - Otherwise continues with the context in extensions
#[instrument(skip_all, name = "authz.middleware.auth")]
pub async fn require_oauth2(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, AuthzError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());
    let token = extract_bearer_token(header);

    let mut context = AuthorizationContext::new();
    let result = state
        .module
        .authorize(token.as_ref().map(|t| t.expose_secret()), &mut context)
        .await?;

    match result {
        AuthorizationResult::Permit => {
            req.extensions_mut().insert(context);
            Ok(next.run(req).await)
        }
        AuthorizationResult::Deny(reason) => {
            tracing::debug!(target: "authz.middleware.auth", reason = reason.as_label(), "Request denied");
            Err(denial_error(reason))
        }
    }
}

fn denial_error(reason: DenialReason) -> AuthzError {
    match reason {
        DenialReason::InsufficientScope => AuthzError::InsufficientScope(reason.reason().to_string()),
        DenialReason::MissingToken | DenialReason::InvalidToken => {
            AuthzError::InvalidToken(reason.reason().to_string())
        }
    }
}

/// Extension trait for reading the authorization context from a request.
pub trait AuthorizationContextExt {
    /// Returns `None` if the authorization middleware was not applied.
    fn authorization_context(&self) -> Option<&AuthorizationContext>;
}

impl<B> AuthorizationContextExt for axum::extract::Request<B> {
    fn authorization_context(&self) -> Option<&AuthorizationContext> {
        self.extensions().get::<AuthorizationContext>()
    }
}

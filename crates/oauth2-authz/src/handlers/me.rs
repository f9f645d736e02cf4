//! Current caller handler.
//!
//! Returns the profile information attached by the authorization middleware.

use crate::auth::AuthorizationContext;
use crate::errors::AuthzError;
use crate::models::MeResponse;
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/v1/me
///
/// Requires the authorization middleware. A permitted token without
/// user-info yields an empty profile.
///
/// ```json
/// {"profile": {"sub": "alice", "email": "alice@example.com"}}
/// ```
#[instrument(skip_all, name = "authz.handlers.me")]
pub async fn get_me(
    context: Option<Extension<AuthorizationContext>>,
) -> Result<Json<MeResponse>, AuthzError> {
    let Some(Extension(context)) = context else {
        tracing::error!(target: "authz.handlers.me", "Authorization context missing; middleware not applied");
        return Err(AuthzError::Internal);
    };

    let profile = context.profile_info().cloned().unwrap_or_default();

    Ok(Json(MeResponse { profile }))
}

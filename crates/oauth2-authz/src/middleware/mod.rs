//! Middleware for the authorization service.
//!
//! # Components
//!
//! - `auth` - OAuth2 bearer-token authorization for protected routes
//! - `http_metrics` - HTTP request metrics middleware

pub mod auth;
pub mod http_metrics;

pub use auth::{require_oauth2, AuthState, AuthorizationContextExt};
pub use http_metrics::http_metrics_middleware;

//! OAuth2 Authorization Service Library
//!
//! This library authorizes requests carrying an OAuth2 bearer token by
//! validating the token against a remote OAuth2 authority:
//!
//! - Token introspection via a token-info endpoint (and optional user-info)
//! - Required-scope enforcement
//! - Bounded, insertion-ordered caching of validation results
//! - An axum middleware that turns decisions into HTTP responses
//!
//! # Architecture
//!
//! ```text
//! routes/mod.rs -> middleware/auth.rs -> auth/module.rs -> auth/cache.rs
//!                                                       -> auth/rest.rs
//! ```
//!
//! # Modules
//!
//! - `auth` - Validation cache, validators, and the authorization module
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - Bearer-token authorization and HTTP metrics layers
//! - `models` - Response models
//! - `observability` - Prometheus metrics
//! - `routes` - Axum router setup

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;

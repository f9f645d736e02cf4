//! Observability for the authorization service.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;

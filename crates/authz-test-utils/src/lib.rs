//! # Authz Test Utilities
//!
//! Shared test utilities for the OAuth2 authorization service.
//!
//! This crate provides:
//! - Server test harness (`TestAuthzServer` for E2E tests)
//! - Validation response and token-info fixtures
//!
//! ## Usage
//!
//! ```rust,ignore
//! use authz_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let validator = Arc::new(StubValidator::returning(valid_response(&["read"])));
//!     let server = TestAuthzServer::spawn_with_validator(test_config(), validator).await?;
//!
//!     let response = reqwest::Client::new()
//!         .get(format!("{}/api/v1/me", server.url()))
//!         .bearer_auth("ACCESS_TOKEN")
//!         .send()
//!         .await?;
//!
//!     assert_eq!(response.status(), 200);
//!     Ok(())
//! }
//! ```

pub mod fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use fixtures::*;
pub use oauth2_authz::auth::validator::mock::StubValidator;
pub use server_harness::*;

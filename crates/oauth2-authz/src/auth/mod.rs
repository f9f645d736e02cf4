//! OAuth2 access-token authorization.
//!
//! # Components
//!
//! - `bearer` - Bearer token extraction from the Authorization header
//! - `cache` - Bounded, insertion-ordered cache of validation results
//! - `context` - Per-request authorization attributes
//! - `module` - The authorization decision function
//! - `registry` - Validator factories keyed by configuration
//! - `rest` - Token-info/user-info backed validator
//! - `validator` - Validator trait and validation response

pub mod bearer;
pub mod cache;
pub mod context;
pub mod module;
pub mod registry;
pub mod rest;
pub mod validator;

pub use bearer::extract_bearer_token;
pub use cache::TokenValidationCache;
pub use context::{AuthorizationContext, OAUTH2_PROFILE_INFO_CONTEXT_KEY};
pub use module::{AuthorizationResult, DenialReason, OAuth2Module};
pub use registry::{ValidatorKind, ValidatorRegistry};
pub use rest::RestAccessTokenValidator;
pub use validator::{AccessTokenValidator, ValidationResponse};

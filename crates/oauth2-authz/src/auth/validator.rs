//! Access-token validator capability and the validation response.
//!
//! Validators perform the actual token introspection against an external
//! authority. An invalid token is a normal outcome: validators return a
//! `ValidationResponse` that is not valid rather than an error. Errors are
//! reserved for calls that could not complete.

use crate::errors::ValidatorError;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Result of validating one access token.
///
/// Immutable once built. Validity is evaluated against the clock at the
/// time of the check, so a cached response turns invalid on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResponse {
    expires_at: DateTime<Utc>,
    profile_info: Map<String, Value>,
    scopes: HashSet<String>,
}

impl ValidationResponse {
    /// Build a response from its parts.
    pub fn new(
        expires_at: DateTime<Utc>,
        profile_info: Map<String, Value>,
        scopes: HashSet<String>,
    ) -> Self {
        Self {
            expires_at,
            profile_info,
            scopes,
        }
    }

    /// A response for a token the authority rejected.
    ///
    /// Expiry is the UNIX epoch, with no profile information and no scopes.
    pub fn invalid() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH, Map::new(), HashSet::new())
    }

    /// Whether the token is valid right now.
    pub fn is_token_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Whether the token is valid at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn profile_info(&self) -> &Map<String, Value> {
        &self.profile_info
    }

    pub fn scopes(&self) -> &HashSet<String> {
        &self.scopes
    }

    /// Merges `profile` over the current profile information.
    pub fn with_profile_info(mut self, profile: Map<String, Value>) -> Self {
        self.profile_info.extend(profile);
        self
    }
}

/// Performs remote validation of an access token.
#[async_trait::async_trait]
pub trait AccessTokenValidator: Send + Sync {
    /// Validate `token` against the authority.
    ///
    /// # Errors
    ///
    /// Returns `ValidatorError` when the remote call cannot complete. A
    /// rejected token is reported as `Ok` with an invalid response.
    async fn validate(&self, token: &str) -> Result<ValidationResponse, ValidatorError>;
}

/// Stub validator module for testing.
///
/// Provides a scripted `AccessTokenValidator` for unit and integration tests.
pub mod mock {

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Stub validator returning scripted responses.
    pub struct StubValidator {
        /// Responses to return (cycles through them).
        responses: Vec<ValidationResponse>,
        /// Number of calls made.
        call_count: AtomicUsize,
        /// Whether to return errors.
        return_error: bool,
        /// Tokens seen, in call order.
        seen_tokens: Mutex<Vec<String>>,
        /// Time to wait before answering, simulating a remote round trip.
        delay: Option<std::time::Duration>,
    }

    impl StubValidator {
        /// Create a stub that always returns `response`.
        pub fn returning(response: ValidationResponse) -> Self {
            Self::with_responses(vec![response])
        }

        /// Create a stub that returns custom responses in sequence.
        pub fn with_responses(responses: Vec<ValidationResponse>) -> Self {
            Self {
                responses,
                call_count: AtomicUsize::new(0),
                return_error: false,
                seen_tokens: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        /// Create a stub whose calls always fail.
        pub fn failing() -> Self {
            Self {
                responses: vec![],
                call_count: AtomicUsize::new(0),
                return_error: true,
                seen_tokens: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        /// Wait `delay` inside every call before answering.
        pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Get the tokens passed to `validate`, in call order.
        pub fn seen_tokens(&self) -> Vec<String> {
            self.seen_tokens
                .lock()
                .map(|tokens| tokens.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait::async_trait]
    impl AccessTokenValidator for StubValidator {
        async fn validate(&self, token: &str) -> Result<ValidationResponse, ValidatorError> {
            let count = self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut tokens) = self.seen_tokens.lock() {
                tokens.push(token.to_string());
            }

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.return_error {
                return Err(ValidatorError::Transport(
                    "Stub validator error".to_string(),
                ));
            }

            if self.responses.is_empty() {
                return Ok(ValidationResponse::invalid());
            }

            // Cycle through responses
            let idx = count % self.responses.len();
            Ok(self
                .responses
                .get(idx)
                .cloned()
                .unwrap_or_else(ValidationResponse::invalid))
        }
    }

}

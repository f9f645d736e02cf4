//! OAuth2 authorization decision function.
//!
//! Given a bearer token, decides whether the request is permitted:
//!
//! 1. No token: deny without calling the validator
//! 2. Cache lookup (if caching is enabled)
//! 3. On a miss, validate remotely and cache the result (valid or not)
//! 4. Check validity against the current time, then required scopes
//!
//! On permit, the token's profile information is written to the request's
//! `AuthorizationContext`. Validator failures are returned as errors and
//! are never retried or cached.
//!
//! Concurrent misses for the same token each call the validator; there is
//! no in-flight de-duplication.

use crate::auth::cache::TokenValidationCache;
use crate::auth::context::{AuthorizationContext, OAUTH2_PROFILE_INFO_CONTEXT_KEY};
use crate::auth::registry::ValidatorRegistry;
use crate::auth::validator::{AccessTokenValidator, ValidationResponse};
use crate::config::{Config, ConfigError};
use crate::errors::AuthorizationError;
use crate::observability::metrics::{record_authorization, record_token_cache_lookup};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    /// No access token was presented.
    MissingToken,
    /// The token is expired or was rejected by the authority.
    InvalidToken,
    /// The token lacks at least one required scope.
    InsufficientScope,
}

impl DenialReason {
    /// Human-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            DenialReason::MissingToken => "Access Token is null.",
            DenialReason::InvalidToken => "Access Token is invalid.",
            DenialReason::InsufficientScope => "Access Token does not contain required scopes.",
        }
    }

    /// Bounded label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            DenialReason::MissingToken => "missing_token",
            DenialReason::InvalidToken => "invalid_token",
            DenialReason::InsufficientScope => "insufficient_scope",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Outcome of a successful authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationResult {
    Permit,
    Deny(DenialReason),
}

impl AuthorizationResult {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationResult::Permit)
    }
}

/// OAuth2 authorization module.
///
/// Thread-safe; share it behind an `Arc` across request handlers.
pub struct OAuth2Module {
    /// Remote validator consulted on cache misses.
    validator: Arc<dyn AccessTokenValidator>,

    /// Scopes every token must carry.
    required_scopes: HashSet<String>,

    /// Validation cache, absent when caching is disabled.
    cache: Option<TokenValidationCache>,
}

impl OAuth2Module {
    /// Create a new module.
    ///
    /// # Arguments
    ///
    /// * `validator` - Validator used on cache misses
    /// * `required_scopes` - Scopes a token must carry to be permitted
    /// * `cache_enabled` - Whether validation results are cached
    /// * `cache_size` - Maximum cached entries; values <= 0 disable the cache
    pub fn new(
        validator: Arc<dyn AccessTokenValidator>,
        required_scopes: HashSet<String>,
        cache_enabled: bool,
        cache_size: i64,
    ) -> Self {
        let cache = if !cache_enabled {
            None
        } else if cache_size <= 0 {
            tracing::warn!(
                target: "authz.auth.module",
                cache_size,
                "Cache size is not positive, validation cache disabled"
            );
            None
        } else {
            let max_size = usize::try_from(cache_size).unwrap_or(usize::MAX);
            Some(TokenValidationCache::new(max_size))
        };

        Self {
            validator,
            required_scopes,
            cache,
        }
    }

    /// Create a module that never caches validation results.
    pub fn without_cache(
        validator: Arc<dyn AccessTokenValidator>,
        required_scopes: HashSet<String>,
    ) -> Self {
        Self::new(validator, required_scopes, false, 0)
    }

    /// Create a module from service configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configured validator cannot be built.
    pub fn from_config(config: &Config, registry: &ValidatorRegistry) -> Result<Self, ConfigError> {
        let validator = registry.build(config)?;
        Ok(Self::new(
            validator,
            config.required_scopes.clone(),
            config.cache_enabled,
            config.cache_size,
        ))
    }

    /// The validation cache, if caching is enabled.
    pub fn cache(&self) -> Option<&TokenValidationCache> {
        self.cache.as_ref()
    }

    pub fn required_scopes(&self) -> &HashSet<String> {
        &self.required_scopes
    }

    /// Authorize a request presenting `token`.
    ///
    /// # Errors
    ///
    /// Returns `AuthorizationError::Validation` if the validator call fails.
    /// Denials are returned as `Ok(AuthorizationResult::Deny(_))`.
    #[instrument(skip_all, name = "authz.auth.authorize")]
    pub async fn authorize(
        &self,
        token: Option<&str>,
        context: &mut AuthorizationContext,
    ) -> Result<AuthorizationResult, AuthorizationError> {
        let result = self.decide(token, context).await;

        let outcome = match &result {
            Ok(AuthorizationResult::Permit) => "permit",
            Ok(AuthorizationResult::Deny(reason)) => reason.as_label(),
            Err(_) => "error",
        };
        record_authorization(outcome);

        result
    }

    async fn decide(
        &self,
        token: Option<&str>,
        context: &mut AuthorizationContext,
    ) -> Result<AuthorizationResult, AuthorizationError> {
        let Some(token) = token else {
            tracing::debug!(target: "authz.auth.module", "No access token presented");
            return Ok(AuthorizationResult::Deny(DenialReason::MissingToken));
        };

        let response = match self.lookup(token).await {
            Some(cached) => cached,
            None => self.validate(token).await?,
        };

        Ok(self.evaluate(&response, context))
    }

    async fn lookup(&self, token: &str) -> Option<Arc<ValidationResponse>> {
        let cache = self.cache.as_ref()?;
        let cached = cache.get(token).await;
        record_token_cache_lookup(cached.is_some());
        if cached.is_some() {
            tracing::debug!(target: "authz.auth.module", "Validation cache hit");
        }
        cached
    }

    async fn validate(&self, token: &str) -> Result<Arc<ValidationResponse>, AuthorizationError> {
        let response = self.validator.validate(token).await.map_err(|e| {
            tracing::warn!(target: "authz.auth.module", error = %e, "Access token validation failed");
            AuthorizationError::from(e)
        })?;
        let response = Arc::new(response);

        if let Some(cache) = &self.cache {
            cache.add(token, Arc::clone(&response)).await;
        }

        Ok(response)
    }

    fn evaluate(
        &self,
        response: &ValidationResponse,
        context: &mut AuthorizationContext,
    ) -> AuthorizationResult {
        if !response.is_token_valid() {
            tracing::debug!(target: "authz.auth.module", "Access token is invalid or expired");
            return AuthorizationResult::Deny(DenialReason::InvalidToken);
        }

        if !self.required_scopes.is_subset(response.scopes()) {
            tracing::debug!(target: "authz.auth.module", "Access token missing required scopes");
            return AuthorizationResult::Deny(DenialReason::InsufficientScope);
        }

        context.set_attribute(
            OAUTH2_PROFILE_INFO_CONTEXT_KEY,
            Value::Object(response.profile_info().clone()),
        );
        AuthorizationResult::Permit
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::auth::validator::mock::StubValidator;
    use crate::errors::ValidatorError;
    use chrono::{Duration, Utc};
    use serde_json::{json, Map};

    fn scopes(names: &[&str]) -> HashSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn valid_response(granted: &[&str]) -> ValidationResponse {
        ValidationResponse::new(Utc::now() + Duration::minutes(5), Map::new(), scopes(granted))
    }

    fn expired_response(granted: &[&str]) -> ValidationResponse {
        ValidationResponse::new(Utc::now() - Duration::seconds(1), Map::new(), scopes(granted))
    }

    fn module(
        stub: &Arc<StubValidator>,
        required: &[&str],
        cache_enabled: bool,
        cache_size: i64,
    ) -> OAuth2Module {
        OAuth2Module::new(
            Arc::clone(stub) as Arc<dyn AccessTokenValidator>,
            scopes(required),
            cache_enabled,
            cache_size,
        )
    }

    #[tokio::test]
    async fn test_null_token_denied_without_validation() {
        let stub = Arc::new(StubValidator::returning(valid_response(&[])));
        let module = module(&stub, &[], true, 10);
        let mut ctx = AuthorizationContext::new();

        let result = module.authorize(None, &mut ctx).await.unwrap();

        assert_eq!(result, AuthorizationResult::Deny(DenialReason::MissingToken));
        assert_eq!(DenialReason::MissingToken.reason(), "Access Token is null.");
        assert_eq!(stub.call_count(), 0);
        assert_eq!(module.cache().unwrap().size().await, 0);
        assert!(ctx.profile_info().is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_with_valid_token_permits() {
        let stub = Arc::new(StubValidator::failing());
        let module = module(&stub, &[], true, 10);
        module
            .cache()
            .unwrap()
            .add("ACCESS_TOKEN", Arc::new(valid_response(&["SCOPE_A"])))
            .await;

        let mut ctx = AuthorizationContext::new();
        let result = module.authorize(Some("ACCESS_TOKEN"), &mut ctx).await.unwrap();

        assert!(result.is_authorized());
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cached_expired_token_denied_without_revalidation() {
        let stub = Arc::new(StubValidator::returning(valid_response(&["SCOPE_A"])));
        let module = module(&stub, &[], true, 10);
        module
            .cache()
            .unwrap()
            .add("ACCESS_TOKEN", Arc::new(expired_response(&["SCOPE_A"])))
            .await;

        let mut ctx = AuthorizationContext::new();
        let result = module.authorize(Some("ACCESS_TOKEN"), &mut ctx).await.unwrap();

        assert_eq!(result, AuthorizationResult::Deny(DenialReason::InvalidToken));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_denied_on_miss() {
        let stub = Arc::new(StubValidator::returning(expired_response(&["SCOPE_A"])));
        let module = module(&stub, &[], false, 0);

        let result = module
            .authorize(Some("ACCESS_TOKEN"), &mut AuthorizationContext::new())
            .await
            .unwrap();

        assert_eq!(result, AuthorizationResult::Deny(DenialReason::InvalidToken));
        assert_eq!(DenialReason::InvalidToken.to_string(), "Access Token is invalid.");
    }

    #[tokio::test]
    async fn test_missing_required_scope_denied() {
        let stub = Arc::new(StubValidator::returning(valid_response(&["SCOPE_A"])));
        let module = module(&stub, &["SCOPE_A", "SCOPE_B"], true, 10);
        let mut ctx = AuthorizationContext::new();

        let result = module.authorize(Some("ACCESS_TOKEN"), &mut ctx).await.unwrap();

        assert_eq!(
            result,
            AuthorizationResult::Deny(DenialReason::InsufficientScope)
        );
        assert_eq!(
            DenialReason::InsufficientScope.reason(),
            "Access Token does not contain required scopes."
        );
        assert!(ctx.profile_info().is_none());
    }

    #[tokio::test]
    async fn test_miss_validates_and_caches() {
        let stub = Arc::new(StubValidator::returning(valid_response(&["SCOPE_A"])));
        let module = module(&stub, &[], true, 10);

        let result = module
            .authorize(Some("ACCESS_TOKEN"), &mut AuthorizationContext::new())
            .await
            .unwrap();

        assert!(result.is_authorized());
        assert_eq!(stub.call_count(), 1);
        assert!(module.cache().unwrap().get("ACCESS_TOKEN").await.is_some());
    }

    #[tokio::test]
    async fn test_cache_used_on_subsequent_requests() {
        let stub = Arc::new(StubValidator::returning(valid_response(&["SCOPE_A"])));
        let module = module(&stub, &[], true, 10);

        for _ in 0..3 {
            let result = module
                .authorize(Some("ACCESS_TOKEN"), &mut AuthorizationContext::new())
                .await
                .unwrap();
            assert!(result.is_authorized());
        }

        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn test_cache_not_used_when_disabled() {
        let stub = Arc::new(StubValidator::returning(valid_response(&["SCOPE_A"])));
        let module = module(&stub, &[], false, 10);

        for _ in 0..2 {
            let result = module
                .authorize(Some("ACCESS_TOKEN"), &mut AuthorizationContext::new())
                .await
                .unwrap();
            assert!(result.is_authorized());
        }

        assert!(module.cache().is_none());
        assert_eq!(stub.call_count(), 2);
    }

    #[tokio::test]
    async fn test_non_positive_cache_size_disables_cache() {
        let stub = Arc::new(StubValidator::returning(valid_response(&[])));

        assert!(module(&stub, &[], true, 0).cache().is_none());
        assert!(module(&stub, &[], true, -3).cache().is_none());
        assert_eq!(
            module(&stub, &[], true, 7).cache().unwrap().max_size(),
            7
        );
    }

    #[tokio::test]
    async fn test_profile_info_added_to_context() {
        let mut profile = Map::new();
        profile.insert("sub".to_string(), json!("alice"));
        profile.insert("email".to_string(), json!("alice@example.com"));
        let response =
            ValidationResponse::new(Utc::now() + Duration::minutes(5), profile.clone(), HashSet::new());
        let stub = Arc::new(StubValidator::returning(response));
        let module = OAuth2Module::without_cache(
            Arc::clone(&stub) as Arc<dyn AccessTokenValidator>,
            HashSet::new(),
        );
        let mut ctx = AuthorizationContext::new();

        let result = module.authorize(Some("ACCESS_TOKEN"), &mut ctx).await.unwrap();

        assert!(result.is_authorized());
        assert_eq!(
            ctx.attribute(OAUTH2_PROFILE_INFO_CONTEXT_KEY),
            Some(&Value::Object(profile))
        );
    }

    #[tokio::test]
    async fn test_validator_error_propagates_and_is_not_cached() {
        let stub = Arc::new(StubValidator::failing());
        let module = module(&stub, &[], true, 10);

        let result = module
            .authorize(Some("ACCESS_TOKEN"), &mut AuthorizationContext::new())
            .await;

        assert!(matches!(
            result,
            Err(AuthorizationError::Validation(ValidatorError::Transport(_)))
        ));
        assert_eq!(module.cache().unwrap().size().await, 0);

        // Not retried internally
        assert_eq!(stub.call_count(), 1);
    }

    #[tokio::test]
    async fn test_invalid_result_is_cached() {
        let stub = Arc::new(StubValidator::returning(ValidationResponse::invalid()));
        let module = module(&stub, &[], true, 10);

        for _ in 0..2 {
            let result = module
                .authorize(Some("REVOKED"), &mut AuthorizationContext::new())
                .await
                .unwrap();
            assert_eq!(result, AuthorizationResult::Deny(DenialReason::InvalidToken));
        }

        assert_eq!(stub.call_count(), 1);
        let cached = module.cache().unwrap().get("REVOKED").await.unwrap();
        assert_eq!(cached.expires_at().timestamp(), 0);
    }

    #[tokio::test]
    async fn test_capacity_two_keeps_last_two_tokens() {
        let stub = Arc::new(StubValidator::returning(valid_response(&[])));
        let module = module(&stub, &[], true, 2);

        for token in ["a", "b", "c"] {
            module
                .authorize(Some(token), &mut AuthorizationContext::new())
                .await
                .unwrap();
        }

        let cache = module.cache().unwrap();
        assert_eq!(cache.size().await, 2);
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
        assert!(cache.get("c").await.is_some());
        assert_eq!(stub.seen_tokens(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_permit_iff_granted_is_superset_of_required() {
        let universe = ["read", "write", "admin"];
        let subsets: Vec<Vec<&str>> = (0..(1u8 << universe.len()))
            .map(|mask| {
                universe
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| mask & (1 << i) != 0)
                    .map(|(_, s)| *s)
                    .collect()
            })
            .collect();

        for required in &subsets {
            for granted in &subsets {
                let stub = Arc::new(StubValidator::returning(valid_response(granted)));
                let module = module(&stub, required, false, 0);

                let result = module
                    .authorize(Some("token"), &mut AuthorizationContext::new())
                    .await
                    .unwrap();

                let expected = scopes(required).is_subset(&scopes(granted));
                assert_eq!(
                    result.is_authorized(),
                    expected,
                    "required={required:?} granted={granted:?}"
                );
            }
        }
    }

    #[tokio::test]
    async fn test_concurrent_misses_each_validate() {
        // The delay keeps every call in flight until all four have missed
        let stub = Arc::new(
            StubValidator::returning(valid_response(&[]))
                .with_delay(std::time::Duration::from_millis(20)),
        );
        let module = Arc::new(module(&stub, &[], true, 10));

        let tasks = (0..4).map(|_| {
            let module = Arc::clone(&module);
            async move {
                module
                    .authorize(Some("same-token"), &mut AuthorizationContext::new())
                    .await
            }
        });
        let results = futures::future::join_all(tasks).await;

        assert!(results.iter().all(|r| matches!(r, Ok(AuthorizationResult::Permit))));
        assert_eq!(stub.call_count(), 4);
        assert_eq!(module.cache().unwrap().size().await, 1);
    }
}

//! Validator factories keyed by configuration.
//!
//! The configured `ValidatorKind` selects a factory from the registry,
//! which builds the `AccessTokenValidator` for the service. Tests replace
//! a factory to inject a stub.

use crate::auth::rest::RestAccessTokenValidator;
use crate::auth::validator::AccessTokenValidator;
use crate::config::{Config, ConfigError};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Validator implementations selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidatorKind {
    /// Token-info/user-info REST endpoints.
    Rest,
}

impl ValidatorKind {
    /// Returns the configuration name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidatorKind::Rest => "rest",
        }
    }
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValidatorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(ValidatorKind::Rest),
            other => Err(ConfigError::InvalidValidator(format!(
                "OAUTH2_VALIDATOR must be one of [rest], got '{}'",
                other
            ))),
        }
    }
}

/// Builds a validator from configuration.
pub type ValidatorFactory =
    Box<dyn Fn(&Config) -> Result<Arc<dyn AccessTokenValidator>, ConfigError> + Send + Sync>;

/// Table of validator factories.
pub struct ValidatorRegistry {
    factories: HashMap<ValidatorKind, ValidatorFactory>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorRegistry {
    /// Registry with the built-in validators registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(
            ValidatorKind::Rest,
            Box::new(|config| {
                let validator = RestAccessTokenValidator::from_config(config)?;
                Ok(Arc::new(validator) as Arc<dyn AccessTokenValidator>)
            }),
        );
        registry
    }

    /// Registry with no factories.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register (or replace) the factory for `kind`.
    pub fn register(&mut self, kind: ValidatorKind, factory: ValidatorFactory) {
        self.factories.insert(kind, factory);
    }

    /// Build the validator selected by `config.validator`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsupportedValidator` if no factory is registered
    /// for the configured kind, or the factory's own error.
    pub fn build(&self, config: &Config) -> Result<Arc<dyn AccessTokenValidator>, ConfigError> {
        let factory = self
            .factories
            .get(&config.validator)
            .ok_or_else(|| ConfigError::UnsupportedValidator(config.validator.to_string()))?;

        tracing::debug!(target: "authz.auth.registry", validator = %config.validator, "Building access token validator");
        factory(config)
    }
}

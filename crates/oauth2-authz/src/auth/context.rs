//! Per-request authorization context.

use serde_json::Value;
use std::collections::HashMap;

/// Context attribute holding the token's profile information on permit.
pub const OAUTH2_PROFILE_INFO_CONTEXT_KEY: &str = "oauth2ProfileInfo";

/// Attributes produced while authorizing a single request.
///
/// Handlers read these from request extensions once the authorization
/// middleware has permitted the request.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationContext {
    attributes: HashMap<String, Value>,
}

impl AuthorizationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: Value) {
        self.attributes.insert(key.into(), value);
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    /// Profile information placed by the OAuth2 module, if any.
    pub fn profile_info(&self) -> Option<&serde_json::Map<String, Value>> {
        self.attribute(OAUTH2_PROFILE_INFO_CONTEXT_KEY)
            .and_then(Value::as_object)
    }
}

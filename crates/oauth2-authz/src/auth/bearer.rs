//! Bearer token extraction.

use secrecy::SecretString;

const BEARER_PREFIX: &str = "Bearer ";

/// Pulls the access token out of an `Authorization` header value.
///
/// Returns `None` when the header is absent, not a Bearer credential, or
/// carries an empty token. The scheme name is matched case-insensitively.
pub fn extract_bearer_token(header: Option<&str>) -> Option<SecretString> {
    let header = header?.trim();

    let prefix = header.get(..BEARER_PREFIX.len())?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return None;
    }

    let token = header.get(BEARER_PREFIX.len()..)?.trim();
    if token.is_empty() {
        return None;
    }

    Some(SecretString::from(token))
}

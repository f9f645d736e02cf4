//! Bounded cache of access-token validation results.
//!
//! Entries are keyed by the raw token string and kept in insertion order.
//! When an insertion pushes the cache past its maximum size, the single
//! oldest-inserted entry is evicted. Reads never refresh an entry's
//! position, and overwriting a key keeps its original position.
//!
//! There is no time-based eviction. An expired or rejected token stays
//! cached until capacity pressure removes it; callers must check
//! `ValidationResponse::is_token_valid` on every hit.

use crate::auth::validator::ValidationResponse;
use crate::observability::metrics::set_token_cache_entries;
use indexmap::IndexMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::instrument;

/// Thread-safe, insertion-ordered token validation cache.
///
/// Readers proceed concurrently; `add` takes the write lock and excludes
/// all other readers and writers for the duration of the mutation.
pub struct TokenValidationCache {
    /// Maximum number of entries. Zero keeps the cache empty.
    max_size: usize,

    /// Cached responses in insertion order.
    entries: RwLock<IndexMap<String, Arc<ValidationResponse>>>,
}

impl TokenValidationCache {
    /// Create a cache holding at most `max_size` entries.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: RwLock::new(IndexMap::with_capacity(max_size.min(1024))),
        }
    }

    /// Maximum number of entries this cache holds.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Insert or overwrite the cached response for `token`.
    ///
    /// Evicts the oldest-inserted entry if the cache is now over capacity.
    #[instrument(skip_all)]
    pub async fn add(&self, token: &str, response: Arc<ValidationResponse>) {
        let mut entries = self.entries.write().await;
        entries.insert(token.to_string(), response);

        if entries.len() > self.max_size {
            // shift_remove keeps the remaining entries in insertion order
            if entries.shift_remove_index(0).is_some() {
                tracing::debug!(target: "authz.auth.cache", "Evicted oldest cache entry");
            }
        }

        set_token_cache_entries(entries.len());
    }

    /// Look up the cached response for `token`.
    ///
    /// Returns `None` without touching the cache if the token is absent.
    pub async fn get(&self, token: &str) -> Option<Arc<ValidationResponse>> {
        let entries = self.entries.read().await;
        entries.get(token).cloned()
    }

    /// Current number of cached entries.
    pub async fn size(&self) -> usize {
        self.entries.read().await.len()
    }
}

//! Rendered-entry store trait.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn from_backend(err: impl std::fmt::Display) -> Self {
        Self::Backend {
            message: err.to_string(),
        }
    }
}

/// Key-value store holding rendered entries, keyed by [`super::keys::entry_key`].
///
/// Values are opaque to invalidation; the renderer decides what a rendered
/// entry contains.
#[async_trait]
pub trait EntryStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write an entry. Expiry is store policy, fixed when the store is
    /// constructed, so the renderer never carries TTL plumbing.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove an entry. Returns `true` when a value was actually present.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;
}

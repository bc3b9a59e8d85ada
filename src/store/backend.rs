//! Backend trait for the KV store.
//!
//! Defines the single-key operations the tag index relies on. There is no
//! multi-key transaction here: the only atomic primitives are the
//! version-checked [`KvBackend::compare_and_swap`] and
//! [`KvBackend::delete_if_version`].

use super::error::StoreResult;
use super::types::Version;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Backend trait for key-value storage with per-entry TTL.
///
/// All backends must be thread-safe (`Send + Sync`) for use with tokio.
/// Expired entries must behave exactly like missing ones for every
/// operation, including the conditional ones.
///
/// # Example
///
/// ```ignore
/// use taggable_cache::store::{KvBackend, MemoryBackend};
///
/// let backend = MemoryBackend::new();
/// backend.set("key", b"value".to_vec(), None).await?;
/// let (value, version) = backend.get_versioned("key").await?.unwrap();
/// ```
#[async_trait]
pub trait KvBackend: Send + Sync + 'static {
    /// Retrieves a value by key.
    ///
    /// Returns `Ok(None)` if the key doesn't exist or has expired. An empty
    /// value is returned as `Ok(Some(vec![]))`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.get_versioned(key).await?.map(|(value, _)| value))
    }

    /// Retrieves a value together with its current version.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn get_versioned(&self, key: &str) -> StoreResult<Option<(Vec<u8>, Version)>>;

    /// Stores a value unconditionally, assigning it a fresh version.
    ///
    /// If `ttl` is `Some(duration)`, the entry expires after that duration.
    /// If `None`, the entry never expires.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()>;

    /// Stores a value only if the key is still at `expected`.
    ///
    /// `expected == None` means the key must currently be absent (or
    /// expired). Returns `Ok(false)` without writing on a mismatch.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn compare_and_swap(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        expected: Option<Version>,
    ) -> StoreResult<bool>;

    /// Deletes a key.
    ///
    /// Returns `Ok(true)` if a live entry was removed, `Ok(false)` if there
    /// was nothing to remove. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Deletes a key only if its live entry still carries `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn delete_if_version(&self, key: &str, version: Version) -> StoreResult<bool>;

    /// Removes every entry in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    async fn flush(&self) -> StoreResult<()>;
}

#[async_trait]
impl<B: KvBackend + ?Sized> KvBackend for Arc<B> {
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn get_versioned(&self, key: &str) -> StoreResult<Option<(Vec<u8>, Version)>> {
        (**self).get_versioned(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        (**self).set(key, value, ttl).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        expected: Option<Version>,
    ) -> StoreResult<bool> {
        (**self).compare_and_swap(key, value, ttl, expected).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        (**self).delete(key).await
    }

    async fn delete_if_version(&self, key: &str, version: Version) -> StoreResult<bool> {
        (**self).delete_if_version(key, version).await
    }

    async fn flush(&self) -> StoreResult<()> {
        (**self).flush().await
    }
}

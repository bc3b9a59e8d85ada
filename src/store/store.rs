//! High-level `KvStore` handle over backend implementations.
//!
//! Wraps any `KvBackend` and applies the configured namespace prefix to
//! every key before it reaches the backend.

use super::backend::KvBackend;
use super::error::StoreResult;
use super::memory::MemoryBackend;
use super::redb::RedbBackend;
use super::types::Version;
use anyhow::Result;
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Namespaced handle to a shared key-value store.
///
/// `KvStore` is `Clone`; clones share the same backend. Data keys and tag
/// records issued through one handle share its namespace, which keeps them
/// apart from unrelated applications on the same store.
///
/// # Example
///
/// ```ignore
/// use taggable_cache::store::KvStore;
/// use std::time::Duration;
///
/// let store = KvStore::memory().with_namespace("app:");
/// store.set("session:123", b"user_data", Some(Duration::from_secs(3600))).await?;
///
/// if let Some(data) = store.get("session:123").await? {
///     println!("Found: {} bytes", data.len());
/// }
/// ```
#[derive(Clone)]
pub struct KvStore {
    backend: Arc<dyn KvBackend>,
    namespace: Arc<str>,
}

impl KvStore {
    /// Creates a new `KvStore` backed by a file-based redb database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::custom(RedbBackend::open(path)?))
    }

    /// Creates a new `KvStore` backed by an in-memory store.
    pub fn memory() -> Self {
        Self::custom(MemoryBackend::new())
    }

    /// Creates a new `KvStore` with a custom backend.
    pub fn custom<B: KvBackend>(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Creates a new `KvStore` from a boxed backend.
    pub fn from_boxed(backend: Box<dyn KvBackend>) -> Self {
        Self::from_arc(Arc::from(backend))
    }

    /// Creates a new `KvStore` over a backend that is already shared.
    pub fn from_arc(backend: Arc<dyn KvBackend>) -> Self {
        Self {
            backend,
            namespace: Arc::from(""),
        }
    }

    /// Returns a handle on the same backend under another namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Arc::from(namespace.into());
        self
    }

    /// The prefix applied to every key.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn key<'a>(&self, key: &'a str) -> Cow<'a, str> {
        if self.namespace.is_empty() {
            Cow::Borrowed(key)
        } else {
            Cow::Owned(format!("{}{key}", self.namespace))
        }
    }

    /// Retrieves a value by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.backend.get(&self.key(key)).await
    }

    /// Retrieves a value and its version by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn get_versioned(&self, key: &str) -> StoreResult<Option<(Vec<u8>, Version)>> {
        self.backend.get_versioned(&self.key(key)).await
    }

    /// Stores a key-value pair with an optional TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> StoreResult<()> {
        self.backend.set(&self.key(key), value.to_vec(), ttl).await
    }

    /// Stores a value only if the key is still at `expected`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn compare_and_swap(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        expected: Option<Version>,
    ) -> StoreResult<bool> {
        self.backend
            .compare_and_swap(&self.key(key), value, ttl, expected)
            .await
    }

    /// Deletes a key-value pair.
    ///
    /// Returns `Ok(true)` if the key existed, `Ok(false)` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.backend.delete(&self.key(key)).await
    }

    /// Deletes a key only if it is still at `version`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn delete_if_version(&self, key: &str, version: Version) -> StoreResult<bool> {
        self.backend
            .delete_if_version(&self.key(key), version)
            .await
    }

    /// Removes every entry in the backend, regardless of namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage operation fails.
    pub async fn flush(&self) -> StoreResult<()> {
        self.backend.flush().await
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

//! In-memory KV storage backend.
//!
//! Provides a fast, non-persistent key-value store using DashMap for
//! concurrent access. Ideal for testing, development, and embedded use cases.

use super::backend::KvBackend;
use super::error::StoreResult;
use super::types::Version;
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Entry stored in the memory backend with optional expiration.
#[derive(Clone)]
struct MemoryEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
    version: u64,
}

impl MemoryEntry {
    fn new(value: Vec<u8>, ttl: Option<Duration>, version: u64) -> Self {
        Self {
            value,
            // A TTL past the clock's range means no expiry.
            expires_at: ttl.and_then(|d| Instant::now().checked_add(d)),
            version,
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() >= exp)
    }

    fn live_version(&self) -> Option<Version> {
        (!self.is_expired()).then_some(Version::new(self.version))
    }
}

/// In-memory key-value storage backend using DashMap.
///
/// Provides fast, concurrent access without persistence. All data is lost
/// when the process exits. Conditional writes run under the DashMap shard
/// lock for the key, which makes them atomic with respect to every other
/// operation on that key.
///
/// # Example
///
/// ```ignore
/// use taggable_cache::store::MemoryBackend;
///
/// let backend = MemoryBackend::new();
/// backend.set("key", b"value".to_vec(), None).await?;
/// ```
#[derive(Default)]
pub struct MemoryBackend {
    data: DashMap<String, MemoryEntry>,
    last_version: AtomicU64,
}

impl MemoryBackend {
    /// Creates a new empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries in the store (including expired).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Removes all expired entries from the store.
    ///
    /// Expired entries are otherwise cleaned up lazily on access.
    pub fn cleanup_expired(&self) {
        self.data.retain(|_, entry| !entry.is_expired());
    }

    fn next_version(&self) -> u64 {
        self.last_version.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn get_versioned(&self, key: &str) -> StoreResult<Option<(Vec<u8>, Version)>> {
        if let Some(entry) = self.data.get(key) {
            if let Some(version) = entry.live_version() {
                return Ok(Some((entry.value.clone(), version)));
            }
        } else {
            return Ok(None);
        }

        // Only drop the entry if it is still the expired one we saw.
        self.data.remove_if(key, |_, entry| entry.is_expired());
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let entry = MemoryEntry::new(value, ttl, self.next_version());
        self.data.insert(key.to_string(), entry);
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        expected: Option<Version>,
    ) -> StoreResult<bool> {
        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                if slot.get().live_version() != expected {
                    return Ok(false);
                }
                slot.insert(MemoryEntry::new(value, ttl, self.next_version()));
            },
            Entry::Vacant(slot) => {
                if expected.is_some() {
                    return Ok(false);
                }
                slot.insert(MemoryEntry::new(value, ttl, self.next_version()));
            },
        }
        Ok(true)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        Ok(self
            .data
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }

    async fn delete_if_version(&self, key: &str, version: Version) -> StoreResult<bool> {
        Ok(self
            .data
            .remove_if(key, |_, entry| entry.live_version() == Some(version))
            .is_some())
    }

    async fn flush(&self) -> StoreResult<()> {
        self.data.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_get_set() {
        let backend = MemoryBackend::new();

        backend.set("key1", b"value1".to_vec(), None).await.unwrap();
        let value = backend.get("key1").await.unwrap();
        assert_eq!(value, Some(b"value1".to_vec()));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let backend = MemoryBackend::new();
        let value = backend.get("nonexistent").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_empty_value_is_found() {
        let backend = MemoryBackend::new();

        backend.set("empty", Vec::new(), None).await.unwrap();
        assert_eq!(backend.get("empty").await.unwrap(), Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = MemoryBackend::new();

        backend.set("key1", b"value1".to_vec(), None).await.unwrap();
        assert!(backend.delete("key1").await.unwrap());
        assert_eq!(backend.get("key1").await.unwrap(), None);
        assert!(!backend.delete("key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let backend = MemoryBackend::new();

        backend
            .set(
                "expiring",
                b"value".to_vec(),
                Some(Duration::from_millis(10)),
            )
            .await
            .unwrap();
        assert!(backend.get("expiring").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(backend.get("expiring").await.unwrap().is_none());
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_versions_increase_on_every_write() {
        let backend = MemoryBackend::new();

        backend.set("key", b"a".to_vec(), None).await.unwrap();
        let (_, first) = backend.get_versioned("key").await.unwrap().unwrap();
        backend.set("key", b"b".to_vec(), None).await.unwrap();
        let (_, second) = backend.get_versioned("key").await.unwrap().unwrap();

        assert!(second > first);
    }

    #[tokio::test]
    async fn test_compare_and_swap_requires_absent_key() {
        let backend = MemoryBackend::new();

        assert!(
            backend
                .compare_and_swap("key", b"a".to_vec(), None, None)
                .await
                .unwrap()
        );
        assert!(
            !backend
                .compare_and_swap("key", b"b".to_vec(), None, None)
                .await
                .unwrap()
        );
        assert_eq!(backend.get("key").await.unwrap(), Some(b"a".to_vec()));
    }

    #[tokio::test]
    async fn test_compare_and_swap_rejects_stale_version() {
        let backend = MemoryBackend::new();

        backend.set("key", b"a".to_vec(), None).await.unwrap();
        let (_, stale) = backend.get_versioned("key").await.unwrap().unwrap();
        backend.set("key", b"b".to_vec(), None).await.unwrap();

        let swapped = backend
            .compare_and_swap("key", b"c".to_vec(), None, Some(stale))
            .await
            .unwrap();
        assert!(!swapped);
        assert_eq!(backend.get("key").await.unwrap(), Some(b"b".to_vec()));
    }

    #[tokio::test]
    async fn test_compare_and_swap_treats_expired_as_absent() {
        let backend = MemoryBackend::new();

        backend
            .set("key", b"old".to_vec(), Some(Duration::from_millis(5)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(15)).await;

        assert!(
            backend
                .compare_and_swap("key", b"new".to_vec(), None, None)
                .await
                .unwrap()
        );
        assert_eq!(backend.get("key").await.unwrap(), Some(b"new".to_vec()));
    }

    #[tokio::test]
    async fn test_delete_if_version() {
        let backend = MemoryBackend::new();

        backend.set("key", b"a".to_vec(), None).await.unwrap();
        let (_, first) = backend.get_versioned("key").await.unwrap().unwrap();
        backend.set("key", b"b".to_vec(), None).await.unwrap();

        assert!(!backend.delete_if_version("key", first).await.unwrap());
        let (_, current) = backend.get_versioned("key").await.unwrap().unwrap();
        assert!(backend.delete_if_version("key", current).await.unwrap());
        assert!(backend.get("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_recreated_key_gets_new_version() {
        let backend = MemoryBackend::new();

        backend.set("key", b"a".to_vec(), None).await.unwrap();
        let (_, before) = backend.get_versioned("key").await.unwrap().unwrap();
        backend.delete("key").await.unwrap();
        backend.set("key", b"a".to_vec(), None).await.unwrap();

        assert!(
            !backend
                .compare_and_swap("key", b"b".to_vec(), None, Some(before))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_flush_and_cleanup() {
        let backend = MemoryBackend::new();

        backend.set("a", b"1".to_vec(), None).await.unwrap();
        backend
            .set("b", b"2".to_vec(), Some(Duration::from_millis(1)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        backend.cleanup_expired();
        assert_eq!(backend.len(), 1);

        backend.flush().await.unwrap();
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        let backend = MemoryBackend::new();

        backend
            .set("forever", b"v".to_vec(), Some(Duration::MAX))
            .await
            .unwrap();
        assert!(
            backend
                .compare_and_swap("forever", b"w".to_vec(), Some(Duration::MAX), None)
                .await
                .is_ok()
        );

        assert_eq!(backend.get("forever").await.unwrap(), Some(b"v".to_vec()));
    }
}

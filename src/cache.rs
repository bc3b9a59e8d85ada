//! The taggable cache facade.
//!
//! [`TaggableCache`] stores opaque byte values under string keys and lets
//! callers group keys under tags for bulk invalidation:
//!
//! ```ignore
//! use taggable_cache::TaggableCache;
//! use taggable_cache::store::KvStore;
//!
//! let cache = TaggableCache::new(KvStore::memory());
//!
//! cache.with_tags(["users"]).set("user:1", b"alice", None).await?;
//! cache.with_tags(["users"]).set("user:2", b"bob", None).await?;
//!
//! let report = cache.delete_by_tag("users").await?;
//! assert_eq!(report.deleted, 2);
//! assert!(cache.get("user:1").await?.is_none());
//! ```
//!
//! Tags are attached per call: [`TaggableCache::with_tags`] returns a
//! [`TaggedSet`] that is consumed by its `set`, so tags can never leak into
//! a later write.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{BackendKind, CacheConfig};
use crate::error::{Error, Result};
use crate::keys;
use crate::retry::RetryConfig;
use crate::store::{KvBackend, KvStore};
use crate::tag_index::TagIndex;

/// Outcome of [`TaggableCache::delete_by_tag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    /// The invalidated tag.
    pub tag: String,
    /// Distinct member keys the tag listed.
    pub members: usize,
    /// Member keys that still held a live entry and were removed.
    pub deleted: usize,
}

/// Cache facade over a shared key-value store.
///
/// `TaggableCache` is cheap to clone; clones share the same store handle.
/// Handles in other processes that point at the same store see the same
/// entries and tags, since nothing is kept in process memory.
#[derive(Debug, Clone)]
pub struct TaggableCache {
    store: KvStore,
    index: TagIndex,
    default_ttl: Option<Duration>,
}

impl TaggableCache {
    /// Creates a cache over `store`.
    ///
    /// Entries written without a TTL expire after 24 hours and tag records
    /// never expire.
    pub fn new(store: KvStore) -> Self {
        Self {
            index: TagIndex::new(store.clone()),
            store,
            default_ttl: Some(Duration::from_secs(crate::constants::DEFAULT_TTL_SECS)),
        }
    }

    /// Builds a cache from validated configuration, opening the configured
    /// backend.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid or the
    /// backend cannot be opened.
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::check(config)?;

        let store = match config.store.backend {
            BackendKind::Memory => KvStore::memory(),
            BackendKind::Redb => {
                let path = config
                    .store
                    .path
                    .as_deref()
                    .ok_or_else(|| Error::Config("store.path is required for redb".into()))?;
                KvStore::file(path).map_err(|e| Error::Config(format!("{e:#}")))?
            },
        };

        Ok(Self::assemble(config, store))
    }

    /// Builds a cache from configuration over a caller-supplied backend.
    ///
    /// The backend is expected to have been created from
    /// `config.store.host` and `config.store.port`; `store.backend` and
    /// `store.path` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configuration is invalid.
    pub fn from_config_with_backend<B: KvBackend>(config: &CacheConfig, backend: B) -> Result<Self> {
        Self::check(config)?;
        Ok(Self::assemble(config, KvStore::custom(backend)))
    }

    fn check(config: &CacheConfig) -> Result<()> {
        let validation = config
            .validate()
            .map_err(|e| Error::Config(format!("{e:#}")))?;
        for warning in &validation.warnings {
            warn!(warning = %warning, "Cache configuration warning");
        }
        Ok(())
    }

    fn assemble(config: &CacheConfig, store: KvStore) -> Self {
        debug!(
            endpoint = %config.store.endpoint(),
            namespace = %config.store.namespace,
            backend = ?config.store.backend,
            "Cache configured"
        );
        Self::new(store.with_namespace(config.store.namespace.clone()))
            .with_default_ttl(config.ttl.default_ttl())
            .with_tag_ttl(config.ttl.tag_ttl())
            .with_retry(config.concurrency.retry_config())
    }

    /// Sets the TTL used when `set` is called with `ttl = None`.
    ///
    /// `None` here means such entries never expire.
    #[must_use]
    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the TTL applied to tag records.
    #[must_use]
    pub fn with_tag_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.index = self.index.with_record_ttl(ttl);
        self
    }

    /// Sets the retry budget for contended tag records.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.index = self.index.with_retry(retry);
        self
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn index(&self) -> &TagIndex {
        &self.index
    }

    fn validate(&self, key: &str) -> Result<()> {
        keys::validate(key, self.store.namespace().len())
    }

    /// Retrieves the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key is missing or expired. An empty stored
    /// value comes back as `Ok(Some(vec![]))`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.validate(key)?;
        Ok(self.store.get(key).await?)
    }

    /// Stores `value` under `key` without tags.
    ///
    /// `ttl = None` uses the cache's default TTL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the store rejected the entry.
    pub async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.set_tagged(key, value, ttl, &[]).await
    }

    /// Starts a write that registers the entry under `tags`.
    ///
    /// ```ignore
    /// cache.with_tags(["users", "team:7"]).set("user:1", b"alice", None).await?;
    /// ```
    pub fn with_tags<I, S>(&self, tags: I) -> TaggedSet<'_>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TaggedSet {
            cache: self,
            tags: collect_tags(tags),
        }
    }

    async fn set_tagged(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
        tags: &[String],
    ) -> Result<()> {
        self.validate(key)?;
        for tag in tags {
            self.validate(tag)?;
        }

        let ttl = ttl.or(self.default_ttl);
        if let Err(source) = self.store.set(key, value, ttl).await {
            // Leave nothing half-written behind a failed set.
            if let Err(cleanup) = self.store.delete(key).await {
                warn!(key = %key, error = %cleanup, "Cleanup after failed write also failed");
            }
            return Err(Error::write(key, source));
        }
        debug!(key = %key, bytes = value.len(), tags = tags.len(), "Stored entry");

        let mut failed = Vec::new();
        let mut first_error = None;
        for tag in tags {
            if let Err(err) = self.index.add_member(tag, key).await {
                warn!(key = %key, tag = %tag, error = %err, "Failed to register tag");
                failed.push(tag.clone());
                first_error.get_or_insert(err);
            }
        }

        match first_error {
            Some(source) => Err(Error::tag_registration(key, failed, source)),
            None => Ok(()),
        }
    }

    /// Deletes `key`.
    ///
    /// Returns `true` if a live entry was removed. Tag records that list the
    /// key are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the store fails.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        self.validate(key)?;
        Ok(self.store.delete(key).await?)
    }

    /// Lists the keys currently registered under `tag`.
    ///
    /// Listed keys may have expired or been deleted individually.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is invalid, the store fails, or the
    /// record is corrupt.
    pub async fn tag_members(&self, tag: &str) -> Result<Vec<String>> {
        self.validate(tag)?;
        self.index.members(tag).await
    }

    /// Deletes every key registered under `tag`, then the tag record.
    ///
    /// Member keys that are already gone are skipped silently, and a tag
    /// that was never registered is a successful no-op. The record is
    /// removed only after its members, and only if nobody registered a new
    /// member in the meantime; otherwise the new members are deleted too.
    /// If this fails partway, the record is still there and calling it
    /// again finishes the job.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag is invalid, the store fails, the record
    /// is corrupt, or the record kept changing for the whole retry budget.
    pub async fn delete_by_tag(&self, tag: &str) -> Result<Invalidation> {
        self.validate(tag)?;

        let budget = self.index.retry().attempts();
        let mut seen = HashSet::new();
        let mut deleted = 0;
        let mut rounds = 0u32;

        while let Some(record) = self.index.snapshot(tag).await? {
            for member in record.members() {
                if self.store.delete(member).await? {
                    deleted += 1;
                } else {
                    debug!(tag = %tag, key = %member, "Tagged key already gone");
                }
                seen.insert(member.clone());
            }

            if self.index.retire(tag, &record).await? {
                break;
            }

            rounds += 1;
            if rounds >= budget {
                warn!(tag = %tag, rounds = rounds, "Tag kept changing during invalidation");
                return Err(Error::contention(tag, rounds));
            }
            debug!(tag = %tag, round = rounds, "Tag record changed during invalidation, rescanning");
        }

        let report = Invalidation {
            tag: tag.to_string(),
            members: seen.len(),
            deleted,
        };
        info!(
            tag = %tag,
            members = report.members,
            deleted = report.deleted,
            "Tag invalidated"
        );
        Ok(report)
    }

    /// Removes every entry in the store, tags included.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await?;
        info!(namespace = %self.store.namespace(), "Cache flushed");
        Ok(())
    }
}

/// A pending write with tags attached.
///
/// Created by [`TaggableCache::with_tags`]. Calling [`TaggedSet::set`]
/// consumes it whether the write succeeds or not, so the tags apply to that
/// one write only.
#[must_use = "tags are only applied by calling `set`"]
#[derive(Debug)]
pub struct TaggedSet<'a> {
    cache: &'a TaggableCache,
    tags: Vec<String>,
}

impl TaggedSet<'_> {
    /// Replaces the pending tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = collect_tags(tags);
        self
    }

    /// The tags this write will register.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Stores the entry, then registers it under every pending tag.
    ///
    /// Every tag is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Write`] if the entry itself could not be stored, or
    /// [`Error::TagRegistration`] naming the tags that could not be updated
    /// (the entry exists in that case).
    pub async fn set(self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<()> {
        self.cache.set_tagged(key, value, ttl, &self.tags).await
    }
}

fn collect_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.into();
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryBackend;
    use std::sync::Arc;

    fn cache() -> TaggableCache {
        TaggableCache::new(KvStore::memory())
    }

    #[tokio::test]
    async fn test_get_distinguishes_empty_from_missing() {
        let cache = cache();
        cache.set("x", b"", None).await.unwrap();

        assert_eq!(cache.get("x").await.unwrap(), Some(Vec::new()));
        assert_eq!(cache.get("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_tagged_set_registers_members() {
        let cache = cache();
        cache
            .with_tags(["users", "admins"])
            .set("user:1", b"alice", None)
            .await
            .unwrap();

        assert_eq!(cache.tag_members("users").await.unwrap(), ["user:1"]);
        assert_eq!(cache.tag_members("admins").await.unwrap(), ["user:1"]);
    }

    #[tokio::test]
    async fn test_with_tags_replaces_pending_tags() {
        let cache = cache();
        let pending = cache.with_tags(["first"]).with_tags(["second"]);
        assert_eq!(pending.tags(), ["second"]);

        pending.set("k", b"v", None).await.unwrap();

        assert!(cache.tag_members("first").await.unwrap().is_empty());
        assert_eq!(cache.tag_members("second").await.unwrap(), ["k"]);
    }

    #[tokio::test]
    async fn test_duplicate_tags_collapse() {
        let cache = cache();
        let pending = cache.with_tags(["a", "b", "a"]);
        assert_eq!(pending.tags(), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_untagged_set_does_not_touch_index() {
        let cache = cache();
        cache.with_tags(["t1"]).set("k1", b"1", None).await.unwrap();
        cache.set("k2", b"2", None).await.unwrap();

        assert_eq!(cache.tag_members("t1").await.unwrap(), ["k1"]);
    }

    #[tokio::test]
    async fn test_repeated_tagging_keeps_one_entry() {
        let cache = cache();
        for _ in 0..3 {
            cache.with_tags(["users"]).set("user:1", b"a", None).await.unwrap();
        }
        assert_eq!(cache.tag_members("users").await.unwrap(), ["user:1"]);
    }

    #[tokio::test]
    async fn test_delete_leaves_tag_listing() {
        let cache = cache();
        cache.with_tags(["users"]).set("user:1", b"a", None).await.unwrap();

        assert!(cache.delete("user:1").await.unwrap());
        assert!(!cache.delete("user:1").await.unwrap());
        assert_eq!(cache.tag_members("users").await.unwrap(), ["user:1"]);
    }

    #[tokio::test]
    async fn test_delete_by_tag_reports_counts() {
        let cache = cache();
        cache.with_tags(["users"]).set("user:1", b"a", None).await.unwrap();
        cache.with_tags(["users"]).set("user:2", b"b", None).await.unwrap();
        cache.delete("user:2").await.unwrap();

        let report = cache.delete_by_tag("users").await.unwrap();

        assert_eq!(
            report,
            Invalidation {
                tag: "users".to_string(),
                members: 2,
                deleted: 1,
            }
        );
        assert!(cache.get("user:1").await.unwrap().is_none());
        assert!(cache.index().snapshot("users").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_by_unknown_tag_is_noop() {
        let cache = cache();
        cache.set("k", b"v", None).await.unwrap();

        let report = cache.delete_by_tag("nothing").await.unwrap();

        assert_eq!(report.members, 0);
        assert_eq!(report.deleted, 0);
        assert!(cache.get("k").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_default_ttl_applies_when_none_given() {
        let cache = cache().with_default_ttl(Some(Duration::from_millis(10)));
        cache.set("short", b"v", None).await.unwrap();
        cache
            .set("long", b"v", Some(Duration::from_secs(60)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(25)).await;

        assert!(cache.get("short").await.unwrap().is_none());
        assert!(cache.get("long").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_invalid_keys_are_rejected_before_store_calls() {
        let cache = cache();

        assert!(matches!(
            cache.set("", b"v", None).await,
            Err(Error::InvalidKey { .. })
        ));
        assert!(matches!(
            cache.with_tags(["bad tag"]).set("k", b"v", None).await,
            Err(Error::InvalidKey { .. })
        ));
        // The entry was not written because a tag was invalid
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(matches!(
            cache.delete_by_tag("has space").await,
            Err(Error::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_namespace_counts_toward_key_length() {
        let cache = TaggableCache::new(KvStore::memory().with_namespace("ns:"));
        let key = "k".repeat(248);

        assert!(matches!(
            cache.set(&key, b"v", None).await,
            Err(Error::InvalidKey { .. })
        ));
        assert!(cache.set(&"k".repeat(247), b"v", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_flush_clears_entries_and_tags() {
        let cache = cache();
        cache.with_tags(["t"]).set("k", b"v", None).await.unwrap();

        cache.flush().await.unwrap();

        assert!(cache.get("k").await.unwrap().is_none());
        assert!(cache.tag_members("t").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_from_config_applies_namespace() {
        let config = CacheConfig::from_toml_str("[store]\nnamespace = \"app:\"\n").unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let raw = KvStore::from_arc(backend.clone());

        let cache = TaggableCache::from_config_with_backend(&config, backend).unwrap();
        cache.with_tags(["users"]).set("user:1", b"a", None).await.unwrap();

        assert!(raw.get("app:user:1").await.unwrap().is_some());
        assert_eq!(raw.get("app:users").await.unwrap().unwrap(), br#"["user:1"]"#);
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid_config() {
        let config = CacheConfig::from_toml_str("[store]\nport = 0\n").unwrap();
        assert!(matches!(
            TaggableCache::from_config(&config),
            Err(Error::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_unbounded_ttls_mean_no_expiry() {
        let mut config = CacheConfig::default();
        config.ttl.default_secs = u64::MAX;
        config.ttl.tag_secs = u64::MAX;

        let cache = TaggableCache::from_config(&config).unwrap();
        cache.set("plain", b"v", None).await.unwrap();
        cache.with_tags(["t"]).set("tagged", b"v", None).await.unwrap();
        cache
            .set("explicit", b"v", Some(Duration::MAX))
            .await
            .unwrap();

        assert!(cache.get("plain").await.unwrap().is_some());
        assert!(cache.get("explicit").await.unwrap().is_some());
        assert_eq!(cache.tag_members("t").await.unwrap(), ["tagged"]);
    }

    #[tokio::test]
    async fn test_from_config_opens_redb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.redb");
        let toml_str = format!(
            "[store]\nbackend = \"redb\"\npath = {:?}\n",
            path.to_string_lossy()
        );
        let config = CacheConfig::from_toml_str(&toml_str).unwrap();

        let cache = TaggableCache::from_config(&config).unwrap();
        cache.with_tags(["t"]).set("k", b"v", None).await.unwrap();
        cache.delete_by_tag("t").await.unwrap();

        assert!(cache.get("k").await.unwrap().is_none());
        assert!(path.exists());
    }
}

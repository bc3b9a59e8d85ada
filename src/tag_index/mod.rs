//! Tag membership index.
//!
//! For each tag the index keeps a record in the store, under the tag name
//! itself, listing the keys tagged with it. The store offers no multi-key
//! transactions, so every change to a record is an optimistic update: read
//! the record and its version, compute the new member list, then write it
//! back only if the version is unchanged. A lost race is retried with
//! backoff instead of silently overwriting the other writer's change.
//!
//! Nothing is cached in process memory; every call reads the store.
//!
//! # Example
//!
//! ```ignore
//! use taggable_cache::store::KvStore;
//! use taggable_cache::tag_index::TagIndex;
//!
//! let index = TagIndex::new(KvStore::memory());
//! index.add_member("users", "user:1").await?;
//! assert_eq!(index.members("users").await?, vec!["user:1"]);
//!
//! let removed = index.remove_tag("users").await?;
//! assert_eq!(removed, vec!["user:1"]);
//! ```

mod record;


pub use record::TagRecord;

use crate::error::Result;
use crate::retry::{Attempt, RetryConfig, retry_on_conflict};
use crate::store::KvStore;
use std::time::Duration;
use tracing::debug;

/// Tag-to-members index stored alongside the cached entries.
#[derive(Debug, Clone)]
pub struct TagIndex {
    store: KvStore,
    retry: RetryConfig,
    record_ttl: Option<Duration>,
}

impl TagIndex {
    /// Creates an index over `store` with default retry settings and
    /// records that never expire.
    pub fn new(store: KvStore) -> Self {
        Self {
            store,
            retry: RetryConfig::default(),
            record_ttl: None,
        }
    }

    /// Sets the retry budget for conflicting record updates.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the TTL applied whenever a record is written.
    #[must_use]
    pub fn with_record_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.record_ttl = ttl;
        self
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Reads the record for `tag` together with its version.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn snapshot(&self, tag: &str) -> Result<Option<TagRecord>> {
        match self.store.get_versioned(tag).await? {
            Some((bytes, version)) => Ok(Some(TagRecord::decode(tag, &bytes, version)?)),
            None => Ok(None),
        }
    }

    /// Returns the keys tagged with `tag`, or an empty list if the tag has
    /// no record.
    ///
    /// Listed keys may already have expired from the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is corrupt.
    pub async fn members(&self, tag: &str) -> Result<Vec<String>> {
        Ok(self
            .snapshot(tag)
            .await?
            .map(TagRecord::into_members)
            .unwrap_or_default())
    }

    /// Registers `key` under `tag`.
    ///
    /// Returns `true` if the key was added and `false` if it was already a
    /// member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Contention`](crate::Error::Contention) if the record
    /// kept changing for the whole retry budget, or the store error that
    /// stopped the update.
    pub async fn add_member(&self, tag: &str, key: &str) -> Result<bool> {
        let added =
            retry_on_conflict(&self.retry, tag, || self.try_add_member(tag, key)).await?;
        if added {
            debug!(tag = %tag, key = %key, "Registered tag member");
        }
        Ok(added)
    }

    async fn try_add_member(&self, tag: &str, key: &str) -> std::result::Result<bool, Attempt> {
        let (mut members, expected) = match self.snapshot(tag).await? {
            Some(record) if record.contains(key) => return Ok(false),
            Some(record) => {
                let version = record.version();
                (record.into_members(), Some(version))
            },
            None => (Vec::new(), None),
        };
        members.push(key.to_string());

        let bytes = TagRecord::encode(tag, &members)?;
        if self
            .store
            .compare_and_swap(tag, bytes, self.record_ttl, expected)
            .await?
        {
            Ok(true)
        } else {
            Err(Attempt::Conflict)
        }
    }

    /// Deletes the record for `tag` if it is still exactly `record`.
    ///
    /// Returns `false` when the record changed or disappeared since it was
    /// read; the caller decides whether to read it again.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub async fn retire(&self, tag: &str, record: &TagRecord) -> Result<bool> {
        Ok(self.store.delete_if_version(tag, record.version()).await?)
    }

    /// Deletes the record for `tag` and returns the members it listed.
    ///
    /// Returns an empty list if the tag had no record. The member keys
    /// themselves are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Contention`](crate::Error::Contention) if the record
    /// kept changing for the whole retry budget, or the store error that
    /// stopped the removal.
    pub async fn remove_tag(&self, tag: &str) -> Result<Vec<String>> {
        let members = retry_on_conflict(&self.retry, tag, || async {
            let Some(record) = self.snapshot(tag).await? else {
                return Ok::<_, Attempt>(Vec::new());
            };
            if self.retire(tag, &record).await? {
                Ok(record.into_members())
            } else {
                Err(Attempt::Conflict)
            }
        })
        .await?;

        debug!(tag = %tag, members = members.len(), "Removed tag record");
        Ok(members)
    }
}

//! Tag-based invalidation for a TTL key-value cache.
//!
//! A plain key-value cache can only forget one key at a time. This crate
//! adds tags: a write can register its key under any number of tag names,
//! and [`TaggableCache::delete_by_tag`] later removes every key registered
//! under one of them.
//!
//! Tag membership lives in the store itself, next to the entries, so every
//! process sharing the store shares the same tags. Concurrent writers
//! tagging keys with the same tag never lose each other's registrations;
//! see [`tag_index`] for how.
//!
//! # Example
//!
//! ```ignore
//! use taggable_cache::{CacheConfig, TaggableCache};
//!
//! let config = CacheConfig::load_from("cache.toml")?;
//! let cache = TaggableCache::from_config(&config)?;
//!
//! cache.with_tags(["users"]).set("user:1", b"alice", None).await?;
//! cache.delete_by_tag("users").await?;
//! ```

pub mod cache;
pub mod config;
pub mod constants;
pub mod error;
mod keys;
pub mod retry;
pub mod store;
pub mod tag_index;


pub use cache::{Invalidation, TaggableCache, TaggedSet};
pub use config::{BackendKind, CacheConfig, ValidationResult};
pub use error::{Error, Result};
pub use retry::RetryConfig;
pub use store::{KvBackend, KvStore, MemoryBackend, RedbBackend, StoreError, Version};
pub use tag_index::{TagIndex, TagRecord};

//! Key-value store layer with pluggable backends.
//!
//! Everything the tag index needs from the outside world goes through this
//! module: single-key reads and writes with per-entry TTL, plus
//! version-checked writes and deletes. Supported backends:
//!
//! - **MemoryBackend**: fast, non-persistent storage (default, ideal for testing)
//! - **RedbBackend**: persistent storage with ACID guarantees
//!
//! # Example
//!
//! ```ignore
//! use taggable_cache::store::KvStore;
//!
//! // In-memory
//! let store = KvStore::memory();
//! store.set("key", b"value", None).await?;
//!
//! // Persistent
//! let store = KvStore::file("/var/lib/app/cache.redb")?.with_namespace("app:");
//! store.set("key", b"value", None).await?;
//! ```
//!
//! # Custom Backends
//!
//! Implement the `KvBackend` trait to put the cache on another store:
//!
//! ```ignore
//! use taggable_cache::store::{KvBackend, KvStore};
//!
//! struct MemcachedBackend { /* ... */ }
//! impl KvBackend for MemcachedBackend { /* ... */ }
//!
//! let store = KvStore::custom(MemcachedBackend::connect("localhost", 11211)?);
//! ```

mod backend;
mod error;
mod memory;
mod redb;
#[allow(clippy::module_inception)]
mod store;
mod types;


pub use backend::KvBackend;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryBackend;
pub use redb::RedbBackend;
pub use store::KvStore;
pub use types::Version;

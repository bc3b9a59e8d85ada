//! Redb-backed KV storage backend.
//!
//! Provides persistent key-value storage using redb with ACID guarantees.
//! Conditional writes read and write inside one write transaction; redb
//! serializes write transactions, so the check and the write are atomic.

use super::backend::KvBackend;
use super::error::StoreResult;
use super::types::{PersistedEntry, Version};
use anyhow::{Context, Result};
use async_trait::async_trait;
use redb::{
    Database, ReadableDatabase, ReadableTable, Table, TableDefinition, WriteTransaction,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Table name for key-value pairs with expiration and version metadata
pub(crate) const KV_TABLE: TableDefinition<'static, &'static str, &'static [u8]> =
    TableDefinition::new("kv");

/// Holds the store-wide version counter.
const META_TABLE: TableDefinition<'static, &'static str, u64> = TableDefinition::new("kv_meta");

const VERSION_COUNTER: &str = "last_version";

/// Redb-backed key-value storage backend.
///
/// `RedbBackend` is `Clone` and can be shared across threads; every handle
/// refers to the same database.
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Opens or creates a redb database at the given path.
    ///
    /// Creates parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Parent directory cannot be created
    /// - Database file cannot be opened or created (permissions, disk full, etc.)
    /// - Initialization transaction fails to begin or commit
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create KV directory: {}", parent.display()))?;
        }

        let db = Database::create(path)
            .with_context(|| format!("Failed to open KV database: {}", path.display()))?;

        // Create both tables up front so read transactions can open them
        let write_txn = db
            .begin_write()
            .context("Failed to begin initialization transaction")?;
        {
            let _table = write_txn
                .open_table(KV_TABLE)
                .context("Failed to initialize KV table")?;
            let _meta = write_txn
                .open_table(META_TABLE)
                .context("Failed to initialize KV meta table")?;
        }
        write_txn
            .commit()
            .context("Failed to commit initialization transaction")?;

        Ok(Self { db: Arc::new(db) })
    }

    fn get_sync(&self, key: &str) -> Result<Option<(Vec<u8>, Version)>> {
        let read_txn = self
            .db
            .begin_read()
            .context("Failed to begin read transaction")?;

        let table = read_txn
            .open_table(KV_TABLE)
            .context("Failed to open KV table")?;

        let entry = match table
            .get(key)
            .with_context(|| format!("Failed to read key '{key}'"))?
        {
            Some(guard) => decode(key, guard.value())?,
            None => return Ok(None),
        };

        if let Some(version) = entry.live_version()? {
            return Ok(Some((entry.value, version)));
        }

        // Drop read transaction before starting write
        drop(table);
        drop(read_txn);

        self.modify(|table| {
            if let Some(current) = load(table, key)?
                && current.is_expired()?
            {
                remove(table, key)?;
                return Ok(true);
            }
            Ok(false)
        })?;
        Ok(None)
    }

    fn set_sync(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;
        {
            let version = next_version(&write_txn)?;
            let mut table = write_txn
                .open_table(KV_TABLE)
                .context("Failed to open KV table")?;
            store(&mut table, key, &PersistedEntry::new(value, ttl, version)?)?;
        }
        write_txn
            .commit()
            .context("Failed to commit set transaction")?;
        Ok(())
    }

    fn compare_and_swap_sync(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        expected: Option<Version>,
    ) -> Result<bool> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        let swapped = {
            let mut table = write_txn
                .open_table(KV_TABLE)
                .context("Failed to open KV table")?;

            let current = match load(&table, key)? {
                Some(entry) => entry.live_version()?,
                None => None,
            };

            if current == expected {
                let version = next_version(&write_txn)?;
                store(&mut table, key, &PersistedEntry::new(value, ttl, version)?)?;
                true
            } else {
                false
            }
        };

        if swapped {
            write_txn
                .commit()
                .context("Failed to commit compare-and-swap transaction")?;
        } else {
            write_txn
                .abort()
                .context("Failed to abort compare-and-swap transaction")?;
        }
        Ok(swapped)
    }

    fn delete_sync(&self, key: &str) -> Result<bool> {
        self.modify(|table| match load(table, key)? {
            Some(entry) => {
                remove(table, key)?;
                Ok(!entry.is_expired()?)
            },
            None => Ok(false),
        })
    }

    fn delete_if_version_sync(&self, key: &str, version: Version) -> Result<bool> {
        self.modify(|table| match load(table, key)? {
            Some(entry) if entry.live_version()? == Some(version) => {
                remove(table, key)?;
                Ok(true)
            },
            _ => Ok(false),
        })
    }

    fn flush_sync(&self) -> Result<()> {
        self.modify(|table| {
            let keys = table
                .iter()
                .context("Failed to iterate KV table")?
                .map(|item| item.map(|(key, _)| key.value().to_string()))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to read KV entry")?;

            for key in &keys {
                remove(table, key)?;
            }
            Ok(())
        })
    }

    /// Runs `f` against the KV table inside one committed write transaction.
    fn modify<T>(
        &self,
        f: impl FnOnce(&mut Table<'_, &'static str, &'static [u8]>) -> Result<T>,
    ) -> Result<T> {
        let write_txn = self
            .db
            .begin_write()
            .context("Failed to begin write transaction")?;

        let result = {
            let mut table = write_txn
                .open_table(KV_TABLE)
                .context("Failed to open KV table")?;
            f(&mut table)?
        };

        write_txn
            .commit()
            .context("Failed to commit write transaction")?;
        Ok(result)
    }
}

fn decode(key: &str, bytes: &[u8]) -> Result<PersistedEntry> {
    serde_json::from_slice(bytes)
        .with_context(|| format!("Failed to deserialize entry for key '{key}'"))
}

fn load(
    table: &Table<'_, &'static str, &'static [u8]>,
    key: &str,
) -> Result<Option<PersistedEntry>> {
    match table
        .get(key)
        .with_context(|| format!("Failed to read key '{key}'"))?
    {
        Some(guard) => Ok(Some(decode(key, guard.value())?)),
        None => Ok(None),
    }
}

fn store(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    entry: &PersistedEntry,
) -> Result<()> {
    let json = serde_json::to_vec(entry).context("Failed to serialize entry to JSON")?;
    table
        .insert(key, json.as_slice())
        .with_context(|| format!("Failed to insert key '{key}'"))?;
    Ok(())
}

fn remove(table: &mut Table<'_, &'static str, &'static [u8]>, key: &str) -> Result<()> {
    table
        .remove(key)
        .with_context(|| format!("Failed to remove key '{key}'"))?;
    Ok(())
}

fn next_version(write_txn: &WriteTransaction) -> Result<u64> {
    let mut meta = write_txn
        .open_table(META_TABLE)
        .context("Failed to open KV meta table")?;
    let last = meta
        .get(VERSION_COUNTER)
        .context("Failed to read version counter")?
        .map(|guard| guard.value())
        .unwrap_or(0);
    let next = last + 1;
    meta.insert(VERSION_COUNTER, next)
        .context("Failed to update version counter")?;
    Ok(next)
}

#[async_trait]
impl KvBackend for RedbBackend {
    async fn get_versioned(&self, key: &str) -> StoreResult<Option<(Vec<u8>, Version)>> {
        let backend = self.clone();
        let key = key.to_string();
        Ok(tokio::task::spawn_blocking(move || backend.get_sync(&key))
            .await
            .context("Task join error")??)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        let backend = self.clone();
        let key = key.to_string();
        Ok(
            tokio::task::spawn_blocking(move || backend.set_sync(&key, value, ttl))
                .await
                .context("Task join error")??,
        )
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        expected: Option<Version>,
    ) -> StoreResult<bool> {
        let backend = self.clone();
        let key = key.to_string();
        Ok(tokio::task::spawn_blocking(move || {
            backend.compare_and_swap_sync(&key, value, ttl, expected)
        })
        .await
        .context("Task join error")??)
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let backend = self.clone();
        let key = key.to_string();
        Ok(tokio::task::spawn_blocking(move || backend.delete_sync(&key))
            .await
            .context("Task join error")??)
    }

    async fn delete_if_version(&self, key: &str, version: Version) -> StoreResult<bool> {
        let backend = self.clone();
        let key = key.to_string();
        Ok(
            tokio::task::spawn_blocking(move || backend.delete_if_version_sync(&key, version))
                .await
                .context("Task join error")??,
        )
    }

    async fn flush(&self) -> StoreResult<()> {
        let backend = self.clone();
        Ok(tokio::task::spawn_blocking(move || backend.flush_sync())
            .await
            .context("Task join error")??)
    }
}

//! Shared helpers for integration tests.
//!
//! `FlakyBackend` wraps the in-memory backend and fails selected
//! operations on demand, so tests can drive the cache through store
//! failures without a real network store.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use taggable_cache::store::{KvBackend, MemoryBackend, StoreError, StoreResult, Version};

/// Failures a [`FlakyBackend`] injects.
#[derive(Debug, Default)]
pub struct Faults {
    /// Every operation fails as if the store could not be reached.
    pub unavailable: bool,
    /// Unconditional writes to these keys are rejected.
    pub reject_set: HashSet<String>,
    /// Conditional writes to these keys are rejected.
    pub reject_cas: HashSet<String>,
    /// Deletes of these keys are rejected.
    pub reject_delete: HashSet<String>,
    /// Number of upcoming conditional writes that report a version
    /// mismatch without writing.
    pub forced_conflicts: u32,
}

/// In-memory backend with switchable faults.
#[derive(Default)]
pub struct FlakyBackend {
    inner: MemoryBackend,
    faults: Mutex<Faults>,
}

impl FlakyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the fault switches for editing.
    pub fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap()
    }

    /// Clear every injected fault.
    pub fn heal(&self) {
        *self.faults() = Faults::default();
    }

    /// The wrapped backend, bypassing fault injection.
    pub fn inner(&self) -> &MemoryBackend {
        &self.inner
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.faults().unavailable {
            return Err(StoreError::unavailable("connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl KvBackend for FlakyBackend {
    async fn get_versioned(&self, key: &str) -> StoreResult<Option<(Vec<u8>, Version)>> {
        self.check_available()?;
        self.inner.get_versioned(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> StoreResult<()> {
        self.check_available()?;
        if self.faults().reject_set.contains(key) {
            return Err(StoreError::rejected(37, "SERVER_ERROR out of memory storing object"));
        }
        self.inner.set(key, value, ttl).await
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        expected: Option<Version>,
    ) -> StoreResult<bool> {
        self.check_available()?;
        {
            let mut faults = self.faults();
            if faults.reject_cas.contains(key) {
                return Err(StoreError::rejected(37, "SERVER_ERROR out of memory storing object"));
            }
            if faults.forced_conflicts > 0 {
                faults.forced_conflicts -= 1;
                return Ok(false);
            }
        }
        self.inner.compare_and_swap(key, value, ttl, expected).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check_available()?;
        if self.faults().reject_delete.contains(key) {
            return Err(StoreError::rejected(5, "SERVER_ERROR delete failed"));
        }
        self.inner.delete(key).await
    }

    async fn delete_if_version(&self, key: &str, version: Version) -> StoreResult<bool> {
        self.check_available()?;
        self.inner.delete_if_version(key, version).await
    }

    async fn flush(&self) -> StoreResult<()> {
        self.check_available()?;
        self.inner.flush().await
    }
}

/// Install a test-friendly tracing subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

//! Configuration types for a taggable cache.
//!
//! Settings are loaded from TOML and validated before a cache is built:
//!
//! - [`CacheConfig`] - Root configuration struct
//! - [`StoreConfig`] - Store endpoint, namespace and backend selection
//! - [`TtlConfig`] - Entry and tag record lifetimes
//! - [`ConcurrencyConfig`] - Retry budget for contended tag records
//!
//! Every section and field is optional; omitted values fall back to
//! defaults suitable for a local memcached-style store.
//!
//! ```toml
//! [store]
//! host = "cache.internal"
//! port = 11211
//! namespace = "shop:"
//! backend = "redb"
//! path = "/var/lib/shop/cache.redb"
//!
//! [ttl]
//! default_secs = 3600
//!
//! [concurrency]
//! max_retries = 64
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::constants;
use crate::retry::RetryConfig;

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Non-fatal warnings that should be logged but don't prevent operation.
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if there are any warnings.
    #[must_use]
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub ttl: TtlConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
}

/// Which storage backend the cache talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process DashMap store.
    #[default]
    Memory,
    /// Persistent redb file at `store.path`.
    Redb,
}

/// Store endpoint and keyspace settings.
///
/// `host` and `port` describe a networked store for custom backends built
/// with [`TaggableCache::from_config_with_backend`](crate::TaggableCache::from_config_with_backend).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Prefix applied to every data key and tag record key.
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub backend: BackendKind,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            namespace: String::new(),
            backend: BackendKind::default(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// `host:port` of the configured store.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Entry and tag record lifetimes. Zero means "never expires".
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TtlConfig {
    #[serde(default = "default_ttl_secs")]
    pub default_secs: u64,
    #[serde(default)]
    pub tag_secs: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            default_secs: default_ttl_secs(),
            tag_secs: 0,
        }
    }
}

impl TtlConfig {
    /// TTL for entries written without an explicit one.
    #[must_use]
    pub fn default_ttl(&self) -> Option<Duration> {
        secs(self.default_secs)
    }

    /// TTL for tag records.
    #[must_use]
    pub fn tag_ttl(&self) -> Option<Duration> {
        secs(self.tag_secs)
    }
}

/// Retry budget for tag records that change under a conditional write.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConcurrencyConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl ConcurrencyConfig {
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::default()
            .with_max_retries(self.max_retries)
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
    }
}

fn secs(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

fn default_host() -> String {
    constants::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    constants::DEFAULT_PORT
}

fn default_ttl_secs() -> u64 {
    constants::DEFAULT_TTL_SECS
}

fn default_max_retries() -> u32 {
    constants::DEFAULT_MAX_RETRIES
}

fn default_initial_delay_ms() -> u64 {
    constants::DEFAULT_INITIAL_DELAY_MS
}

fn default_max_delay_ms() -> u64 {
    constants::DEFAULT_MAX_DELAY_MS
}

impl CacheConfig {
    /// Load configuration from the specified path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read (IO error)
    /// - The file contains invalid TOML syntax
    /// - Fields have invalid types or unknown names
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid or does not match the schema.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid cache configuration")
    }

    /// Validate configuration with comprehensive checks.
    ///
    /// Returns a `ValidationResult` containing any non-fatal warnings.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails with one or more errors:
    /// - Port 0 or an empty host
    /// - A namespace that cannot prefix a store key
    /// - The redb backend without a path
    /// - An initial retry delay longer than the maximum delay
    pub fn validate(&self) -> Result<ValidationResult> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Store endpoint
        let store = &self.store;
        if store.host.trim().is_empty() {
            errors.push("store.host cannot be empty".to_string());
        }
        if store.port == 0 {
            errors.push(
                "store.port cannot be 0. Use a valid port number (1-65535)\n  \
                 memcached listens on 11211 by default"
                    .to_string(),
            );
        } else if store.port < 1024 {
            warnings.push(format!(
                "store.port {} is a system/privileged port (< 1024)\n  \
                 Recommendation: check that the store really listens there",
                store.port
            ));
        }

        // 2. Namespace
        if store
            .namespace
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            errors.push(format!(
                "store.namespace '{}' contains whitespace or control characters",
                store.namespace
            ));
        }
        if store.namespace.len() >= constants::MAX_KEY_LEN {
            errors.push(format!(
                "store.namespace is {} bytes, leaving no room for keys (limit {})",
                store.namespace.len(),
                constants::MAX_KEY_LEN
            ));
        } else if store.namespace.len() > constants::MAX_KEY_LEN / 2 {
            warnings.push(format!(
                "store.namespace is {} bytes; keys longer than {} bytes will be rejected",
                store.namespace.len(),
                constants::MAX_KEY_LEN - store.namespace.len()
            ));
        }

        // 3. Backend
        match (store.backend, &store.path) {
            (BackendKind::Redb, None) => {
                errors.push("store.path is required when store.backend = \"redb\"".to_string());
            },
            (BackendKind::Redb, Some(path)) if path.as_os_str().is_empty() => {
                errors.push("store.path cannot be empty".to_string());
            },
            (BackendKind::Memory, Some(path)) => {
                warnings.push(format!(
                    "store.path {} is ignored by the memory backend",
                    path.display()
                ));
            },
            _ => {},
        }

        // 4. Concurrency
        let concurrency = &self.concurrency;
        if concurrency.max_retries == 0 {
            warnings.push(
                "concurrency.max_retries is 0\n  \
                 Concurrent tagging of the same tag will fail on the first conflict"
                    .to_string(),
            );
        }
        if concurrency.initial_delay_ms > concurrency.max_delay_ms {
            errors.push(format!(
                "concurrency.initial_delay_ms ({}) exceeds concurrency.max_delay_ms ({})",
                concurrency.initial_delay_ms, concurrency.max_delay_ms
            ));
        }

        if !errors.is_empty() {
            anyhow::bail!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            );
        }

        Ok(ValidationResult { warnings })
    }
}

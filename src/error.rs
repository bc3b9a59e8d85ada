//! Error types for cache and tag-index operations.
//!
//! Each variant maps to one failure category a caller may need to branch
//! on. A missing key or tag is never an error: `get` returns `None` and
//! tag lookups return an empty member list.

use crate::store::StoreError;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Cache errors with structured context.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The store refused to write the primary entry. The entry does not exist.
    #[error("failed to write '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: StoreError,
    },

    /// The entry was written but one or more tag records could not be updated.
    #[error("'{key}' was stored but could not be tagged with [{}]: {source}", .tags.join(", "))]
    TagRegistration {
        key: String,
        tags: Vec<String>,
        #[source]
        source: Box<Error>,
    },

    /// Transport-level failure reaching the store.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Any other store failure.
    #[error("store error: {0}")]
    Store(#[source] StoreError),

    /// A tag record kept changing underneath a conditional update.
    #[error("tag '{tag}' is contended: gave up after {attempts} attempts")]
    Contention { tag: String, attempts: u32 },

    /// A tag record could not be encoded or decoded.
    #[error("tag record '{tag}' is corrupt: {source}")]
    CorruptRecord {
        tag: String,
        #[source]
        source: serde_json::Error,
    },

    /// The key or tag name cannot be stored.
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a write error for the primary entry.
    pub fn write(key: impl Into<String>, source: StoreError) -> Self {
        Self::Write {
            key: key.into(),
            source,
        }
    }

    /// Create a tag registration error.
    pub fn tag_registration(key: impl Into<String>, tags: Vec<String>, source: Error) -> Self {
        Self::TagRegistration {
            key: key.into(),
            tags,
            source: Box::new(source),
        }
    }

    /// Create a contention error.
    pub fn contention(tag: impl Into<String>, attempts: u32) -> Self {
        Self::Contention {
            tag: tag.into(),
            attempts,
        }
    }

    /// Create an invalid key error.
    pub fn invalid_key(key: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason,
        }
    }

    /// The underlying store's result code, if the failure carried one.
    #[must_use]
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Write { source, .. } | Self::StoreUnavailable(source) | Self::Store(source) => {
                source.code()
            },
            Self::TagRegistration { source, .. } => source.code(),
            Self::Contention { .. }
            | Self::CorruptRecord { .. }
            | Self::InvalidKey { .. }
            | Self::Config(_) => None,
        }
    }

    /// Returns true if the store could not be reached.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) => true,
            Self::Write { source, .. } => source.is_unavailable(),
            Self::TagRegistration { source, .. } => source.is_unavailable(),
            _ => false,
        }
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        if err.is_unavailable() {
            Self::StoreUnavailable(err)
        } else {
            Self::Store(err)
        }
    }
}

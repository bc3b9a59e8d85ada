//! Errors reported by store backends.

/// Result type for backend operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failure reported by a [`KvBackend`](super::KvBackend).
///
/// Backends that talk to a remote store should map connection problems to
/// [`StoreError::Unavailable`] and explicit refusals to
/// [`StoreError::Rejected`] with the store's own result code. Anything else
/// can travel as an [`anyhow::Error`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The store could not be reached.
    #[error("store unavailable: {message}")]
    Unavailable { message: String },

    /// The store refused the operation (capacity, item too large, ...).
    #[error("store rejected operation (code {code}): {message}")]
    Rejected { code: u16, message: String },

    /// Any other backend failure.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Create a rejected error carrying the store's result code.
    pub fn rejected(code: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    /// The store's result code, when it supplied one.
    #[must_use]
    pub fn code(&self) -> Option<u16> {
        match self {
            Self::Rejected { code, .. } => Some(*code),
            Self::Unavailable { .. } | Self::Backend(_) => None,
        }
    }

    /// Returns true for transport-level failures.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

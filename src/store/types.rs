//! Entry and version types shared by the store backends.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Version token attached to every live entry.
///
/// Each write assigns a fresh version drawn from a counter that only ever
/// grows for the lifetime of the store, so a key that is deleted and written
/// again never reuses a version it carried before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

impl Version {
    /// Wraps a raw version number.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw version number.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Entry layout persisted by the redb backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PersistedEntry {
    pub value: Vec<u8>,
    pub expires_at_ms: Option<u64>,
    pub version: u64,
}

impl PersistedEntry {
    pub fn new(value: Vec<u8>, ttl: Option<Duration>, version: u64) -> Result<Self> {
        let expires_at_ms = match ttl {
            Some(ttl) => {
                let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
                Some(now_ms()?.saturating_add(ttl_ms))
            },
            None => None,
        };
        Ok(Self {
            value,
            expires_at_ms,
            version,
        })
    }

    pub fn is_expired(&self) -> Result<bool> {
        match self.expires_at_ms {
            Some(at) => Ok(now_ms()? >= at),
            None => Ok(false),
        }
    }

    /// Returns the version if the entry is still live.
    pub fn live_version(&self) -> Result<Option<Version>> {
        Ok((!self.is_expired()?).then_some(Version(self.version)))
    }
}

fn now_ms() -> Result<u64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?;
    Ok(elapsed.as_millis() as u64)
}

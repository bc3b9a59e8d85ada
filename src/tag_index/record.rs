//! Decoded tag index records.

use crate::error::{Error, Result};
use crate::store::Version;

/// The member list stored under a tag name, as read at one version.
///
/// Records are stored as a JSON array of member keys, in registration
/// order. A record never lists the same key twice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    members: Vec<String>,
    version: Version,
}

impl TagRecord {
    pub(crate) fn decode(tag: &str, bytes: &[u8], version: Version) -> Result<Self> {
        let raw: Vec<String> =
            serde_json::from_slice(bytes).map_err(|source| Error::CorruptRecord {
                tag: tag.to_string(),
                source,
            })?;

        // Collapse repeats so readers always see a set.
        let mut members = Vec::with_capacity(raw.len());
        for key in raw {
            if !members.contains(&key) {
                members.push(key);
            }
        }

        Ok(Self { members, version })
    }

    pub(crate) fn encode(tag: &str, members: &[String]) -> Result<Vec<u8>> {
        serde_json::to_vec(members).map_err(|source| Error::CorruptRecord {
            tag: tag.to_string(),
            source,
        })
    }

    /// Member keys in registration order.
    pub fn members(&self) -> &[String] {
        &self.members
    }

    /// Version the record was read at.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns true if `key` is a member.
    pub fn contains(&self, key: &str) -> bool {
        self.members.iter().any(|member| member == key)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Consumes the record, returning its members.
    pub fn into_members(self) -> Vec<String> {
        self.members
    }
}

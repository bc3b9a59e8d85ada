//! Key and tag name validation.

use crate::constants::MAX_KEY_LEN;
use crate::error::{Error, Result};

/// Checks that `key` can be stored under a namespace of `namespace_len` bytes.
///
/// Tag names go through the same check since tag records live in the same
/// keyspace as data entries.
pub(crate) fn validate(key: &str, namespace_len: usize) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_key(key, "key is empty"));
    }
    if namespace_len + key.len() > MAX_KEY_LEN {
        return Err(Error::invalid_key(
            key,
            "key exceeds 250 bytes including namespace",
        ));
    }
    if key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(Error::invalid_key(
            key,
            "key contains whitespace or control characters",
        ));
    }
    Ok(())
}

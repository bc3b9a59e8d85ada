//! Defaults and limits.

/// Default store host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default store port (memcached).
pub const DEFAULT_PORT: u16 = 11211;

/// Default entry TTL in seconds (24 hours).
pub const DEFAULT_TTL_SECS: u64 = 60 * 60 * 24;

/// Longest key the store accepts, namespace included.
pub const MAX_KEY_LEN: usize = 250;

/// Retries after the first conflicting conditional write on a tag record.
pub const DEFAULT_MAX_RETRIES: u32 = 32;

/// Delay before the first retry of a conflicting tag update.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1;

/// Upper bound for the delay between tag update retries.
pub const DEFAULT_MAX_DELAY_MS: u64 = 50;

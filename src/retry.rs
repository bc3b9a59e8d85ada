//! Conflict retries with exponential backoff.
//!
//! Conditional writes on a tag record fail when another writer got there
//! first. Those conflicts are retried here using the `backon` crate; every
//! other failure is returned to the caller on the first attempt.

use crate::constants::{DEFAULT_INITIAL_DELAY_MS, DEFAULT_MAX_DELAY_MS, DEFAULT_MAX_RETRIES};
use crate::error::{Error, Result};
use backon::{ExponentialBuilder, Retryable};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for conflict retries.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Initial delay before first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff (e.g., 2.0 doubles delay each retry).
    pub factor: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            factor: 2.0,
        }
    }
}

impl RetryConfig {
    /// Fail on the first conflict.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set maximum number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set initial delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Total attempts including the first one.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Build the exponential backoff strategy.
    ///
    /// Jitter keeps writers that collided once from colliding again in lockstep.
    fn build_backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_retries as usize)
            .with_factor(self.factor)
            .with_jitter()
    }
}

/// Outcome of one optimistic attempt.
#[derive(Debug)]
pub(crate) enum Attempt {
    /// The record changed between read and conditional write.
    Conflict,
    /// A failure that retrying will not fix.
    Failed(Error),
}

impl From<Error> for Attempt {
    fn from(err: Error) -> Self {
        Self::Failed(err)
    }
}

impl From<crate::store::StoreError> for Attempt {
    fn from(err: crate::store::StoreError) -> Self {
        Self::Failed(err.into())
    }
}

/// Run `operation` until it stops reporting [`Attempt::Conflict`].
///
/// Returns [`Error::Contention`] once the retry budget is spent.
pub(crate) async fn retry_on_conflict<F, Fut, T>(
    config: &RetryConfig,
    tag: &str,
    operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, Attempt>>,
{
    let backoff = config.build_backoff();
    let max_retries = config.max_retries;

    let mut attempt = 0u32;
    let notify = |_: &Attempt, dur: Duration| {
        attempt += 1;
        debug!(
            tag = %tag,
            attempt = attempt,
            max_retries = max_retries,
            next_delay_ms = dur.as_millis() as u64,
            "Tag record changed concurrently, retrying"
        );
    };

    let result = operation
        .retry(backoff)
        .when(|outcome| matches!(outcome, Attempt::Conflict))
        .notify(notify)
        .await;

    match result {
        Ok(value) => Ok(value),
        Err(Attempt::Failed(err)) => Err(err),
        Err(Attempt::Conflict) => {
            warn!(
                tag = %tag,
                attempts = config.attempts(),
                "Tag record still contended, giving up"
            );
            Err(Error::contention(tag, config.attempts()))
        },
    }
}

//! # Retry/Backoff Controller
//!
//! Bounded retry loop with a fixed inter-attempt delay, used around delete calls.
//!
//! Every attempt either finishes the operation or reports a [`LastFailure`]. Network
//! failures and unexpected statuses are retried alike. Once the budget is spent the
//! last observed status and body are surfaced verbatim.
//!
//! ## Usage
//!
//! ```rust
//! use brms_reconciler::backoff::RetryPolicy;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3, Duration::from_millis(400));
//! assert_eq!(policy.max_attempts(), 3);
//! assert_eq!(policy.delay(), Duration::from_millis(400));
//! ```

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::model::ResourceKind;
use crate::observability::metrics;

/// The outcome of an attempt that did not finish the operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastFailure {
    /// HTTP status, or `0` when the request never produced a response
    pub status: u16,
    pub body: String,
}

impl LastFailure {
    #[must_use]
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A connection-level failure (no HTTP response)
    #[must_use]
    pub fn network(error: &EngineError) -> Self {
        Self {
            status: 0,
            body: error.to_string(),
        }
    }
}

/// Result of a single attempt
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    Retry(LastFailure),
}

/// Fixed-delay retry policy
///
/// Delays do not grow between attempts; deletes are expected to settle quickly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` below one is raised to one
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.delete_max_attempts, config.delete_retry_delay)
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it reports [`Attempt::Done`] or the budget is spent
    ///
    /// `op` receives the 1-based attempt number. The delay is slept between attempts,
    /// never after the last one.
    ///
    /// # Errors
    /// Returns [`EngineError::RetryExhausted`] carrying the last failure verbatim
    pub async fn attempt<T, F, Fut>(&self, kind: ResourceKind, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut last = LastFailure::status(0, String::new());
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                metrics::increment_delete_retries(kind.as_str());
                tokio::time::sleep(self.delay).await;
            }
            match op(attempt).await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Retry(failure) => {
                    debug!(
                        kind = %kind,
                        attempt,
                        max_attempts = self.max_attempts,
                        status = failure.status,
                        "attempt did not complete"
                    );
                    last = failure;
                }
            }
        }
        Err(EngineError::RetryExhausted {
            kind,
            attempts: self.max_attempts,
            status: last.status,
            body: last.body,
        })
    }
}

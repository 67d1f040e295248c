//! Retry executor for remote store operations.
//!
//! Every call the store makes against the database is wrapped as a unit of
//! work and handed to [`with_retry`]. Errors are classified by message:
//! transient ones (network, timeout, pool exhaustion, lock contention) are
//! retried with exponential backoff; everything else is returned on the spot.
//!
//! The wait between attempts observes a [`CancellationToken`] and an optional
//! deadline, and aborts with [`StoreError::Cancelled`] as soon as either fires.

use std::future::Future;
use std::time::Duration;

use chatvault_types::config::RetryConfig;
use chatvault_types::error::StoreError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Substrings that mark a store error as transient. Matched case-insensitively.
const TRANSIENT_MARKERS: &[&str] = &[
    // network
    "connection refused",
    "connection reset",
    "timeout",
    "timed out",
    "temporary failure",
    "unexpected eof",
    "end of file",
    "socket",
    // server selection / pool
    "server selection timeout",
    "no reachable servers",
    "connection pool",
    "pool timed out",
    // sqlite lock contention (SQLITE_BUSY / SQLITE_LOCKED)
    "database is locked",
    "database table is locked",
];

/// Markers matched against the message as-is. A lowercase "eof" also occurs
/// inside ordinary words such as "thereof".
const CASE_SENSITIVE_MARKERS: &[&str] = &["EOF"];

/// Whether an error message describes a condition likely to clear on retry.
pub fn is_transient_message(message: &str) -> bool {
    if CASE_SENSITIVE_MARKERS.iter().any(|marker| message.contains(marker)) {
        return true;
    }
    let message = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| message.contains(marker))
}

/// Whether `err` should be retried.
///
/// Only raw store failures are candidates; validation, not-found, duplicate
/// and crypto errors are permanent whatever their text says.
pub fn is_transient(err: &StoreError) -> bool {
    match err {
        StoreError::Backend { message } => is_transient_message(message),
        _ => false,
    }
}

/// Run `op` until it succeeds, fails permanently, or the attempt budget runs out.
///
/// - No delay before the first attempt.
/// - After a transient failure, waits `delay` (starting at
///   `config.initial_delay`, then `min(delay * multiplier, max_delay)`).
/// - Exhausting the budget yields [`StoreError::RetriesExhausted`] wrapping
///   the last error.
/// - Cancellation or the deadline firing during a wait yields
///   [`StoreError::Cancelled`].
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    operation: &str,
    deadline: Option<Instant>,
    mut op: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 1;

    loop {
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_transient(&err) {
            return Err(err);
        }

        if attempt >= max_attempts {
            return Err(StoreError::RetriesExhausted {
                attempts: attempt,
                source: Box::new(err),
            });
        }

        tracing::warn!(
            operation,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "store operation failed, retrying"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(StoreError::Cancelled {
                    operation: operation.to_string(),
                    source: Box::new(err),
                });
            }
            _ = wait_for_deadline(deadline) => {
                return Err(StoreError::Cancelled {
                    operation: operation.to_string(),
                    source: Box::new(err),
                });
            }
            _ = tokio::time::sleep(delay) => {}
        }

        delay = config.next_delay(delay);
        attempt += 1;
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Retry policy plus the cancellation signal shared by one store instance.
///
/// Cheap to clone; clones share the same token.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
    cancel: CancellationToken,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned token (e.g. the process shutdown token).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run `op` under this executor's policy with a deadline `timeout` from now.
    pub async fn run<T, F, Fut>(
        &self,
        operation: &str,
        timeout: Duration,
        op: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let deadline = Instant::now() + timeout;
        with_retry(&self.config, &self.cancel, operation, Some(deadline), op).await
    }
}

//! Bounded retry with fixed backoff for transient database errors.
//!
//! Lock-wait timeouts and deadlocks are expected under concurrent writers
//! and resolve themselves on a fresh attempt; everything else propagates
//! immediately. Which error codes count as transient is backend-specific,
//! so the set is part of the policy's configuration.

use std::future::Future;
use std::time::Duration;

use crate::error::StoreError;

/// Default number of attempts for a retryable database operation.
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;

/// Default wait between attempts.
pub const DEFAULT_RETRY_WAIT: Duration = Duration::from_millis(100);

/// SQLSTATE codes treated as transient on PostgreSQL:
/// - `40001`: serialization_failure
/// - `40P01`: deadlock_detected
/// - `55P03`: lock_not_available
const RETRYABLE_PG_SQLSTATES: &[&str] = &["40001", "40P01", "55P03"];

/// Retries a database operation a bounded number of times on transient
/// errors, sleeping a fixed interval between attempts.
///
/// Fatal errors (anything whose code is not in the retryable set) are
/// returned on the first occurrence. The final attempt's transient error
/// is returned rather than swallowed.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    retryable_codes: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            backoff: DEFAULT_RETRY_WAIT,
            retryable_codes: RETRYABLE_PG_SQLSTATES
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with an explicit attempt bound and backoff, keeping
    /// the default retryable-code set.
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            ..Self::default()
        }
    }

    /// Replace the retryable error-code set (for non-PostgreSQL backends,
    /// e.g. MySQL's 1205/1206/1213 lock errors).
    pub fn with_retryable_codes(mut self, codes: impl IntoIterator<Item = String>) -> Self {
        self.retryable_codes = codes.into_iter().collect();
        self
    }

    /// Whether `err` is a transient condition worth retrying.
    pub fn is_retryable(&self, err: &StoreError) -> bool {
        err.backend_code()
            .is_some_and(|code| self.retryable_codes.iter().any(|c| c == code))
    }

    /// Run `op` until it succeeds, fails fatally, or the attempt bound is
    /// reached.
    pub async fn run<T, F, Fut>(&self, description: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_attempts && self.is_retryable(&err) => {
                    tracing::info!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %err,
                        "{description} failed with transient error, retrying"
                    );
                    tokio::time::sleep(self.backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

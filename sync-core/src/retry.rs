//! Retry policy for failed dispatches.
//!
//! Each failed dispatch costs one attempt. While attempts remain, the
//! operation is retried after an exponential delay:
//!
//! `delay = base · 2^(attempts - 1)`
//!
//! Once `attempts == max_attempts` the operation is exhausted and must be
//! dropped. No jitter is applied.

use std::time::Duration;
use sync_types::SyncOperation;

/// Base delay for the first retry when none is configured.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Largest exponent applied; keeps the multiplication in range.
const MAX_EXPONENT: u32 = 20;

/// Delay before retrying an operation that has failed `attempts` times.
///
/// `attempts` of 0 or 1 both yield the base delay.
pub fn backoff_delay(base: Duration, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1).min(MAX_EXPONENT);
    base.saturating_mul(1u32 << exponent)
}

/// What to do with an operation after a failed dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Retry after `delay`.
    Retry {
        /// Backoff before the retry.
        delay: Duration,
    },
    /// Retry budget used up; drop the operation.
    Exhausted,
}

/// Exponential backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy with the given base delay.
    pub fn new(base_delay: Duration) -> Self {
        Self { base_delay }
    }

    /// Base delay of the first retry.
    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    /// Record a failed dispatch on `op` and decide its fate.
    ///
    /// Increments `attempts` by exactly one, never past `max_attempts`.
    pub fn on_failure(&self, op: &mut SyncOperation) -> FailureOutcome {
        op.attempts = op.attempts.saturating_add(1).min(op.max_attempts);
        if op.is_exhausted() {
            FailureOutcome::Exhausted
        } else {
            FailureOutcome::Retry {
                delay: backoff_delay(self.base_delay, op.attempts),
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_types::{OperationKind, Priority};

    fn make_op(max_attempts: u32) -> SyncOperation {
        SyncOperation::new(OperationKind::Update, "/appointments/7", None, Priority::Medium, 0)
            .with_max_attempts(max_attempts)
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(4000));
    }

    #[test]
    fn backoff_attempt_zero_uses_base() {
        let base = Duration::from_millis(250);
        assert_eq!(backoff_delay(base, 0), base);
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let base = Duration::from_secs(u64::MAX / 2);
        assert_eq!(backoff_delay(base, 40), Duration::MAX);
    }

    #[test]
    fn failure_increments_attempts_by_one() {
        let policy = RetryPolicy::default();
        let mut op = make_op(3);

        policy.on_failure(&mut op);
        assert_eq!(op.attempts, 1);
        policy.on_failure(&mut op);
        assert_eq!(op.attempts, 2);
    }

    #[test]
    fn retries_until_budget_is_spent() {
        let policy = RetryPolicy::new(Duration::from_millis(1000));
        let mut op = make_op(3);

        assert_eq!(
            policy.on_failure(&mut op),
            FailureOutcome::Retry {
                delay: Duration::from_millis(1000)
            }
        );
        assert_eq!(
            policy.on_failure(&mut op),
            FailureOutcome::Retry {
                delay: Duration::from_millis(2000)
            }
        );
        assert_eq!(policy.on_failure(&mut op), FailureOutcome::Exhausted);
        assert_eq!(op.attempts, 3);
    }

    #[test]
    fn attempts_never_exceed_max() {
        let policy = RetryPolicy::default();
        let mut op = make_op(1);

        assert_eq!(policy.on_failure(&mut op), FailureOutcome::Exhausted);
        assert_eq!(policy.on_failure(&mut op), FailureOutcome::Exhausted);
        assert_eq!(op.attempts, 1);
    }
}

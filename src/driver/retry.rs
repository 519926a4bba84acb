//! Retry policies.
//!
//! A policy is consulted with an error classification and the attempt
//! count and answers retry-or-fail; call sites own the sleeping and the
//! loop. Keeping the decision out of the call sites lets the two retry
//! shapes (space propagation, transient transport) stay independently
//! configurable.

use std::time::Duration;

use crate::graph::codes;

use super::error::DriverError;

/// Outcome of consulting a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the given pause.
    Retry(Duration),
    /// Give up and surface the error.
    Fail,
}

// ============================================================================
// SpaceRetryPolicy
// ============================================================================

/// Retry for the `USE <space>` statement.
///
/// A just-created space takes a while to propagate through the cluster, so
/// space-not-found is retried with fixed spacing. Every other server
/// failure is final.
#[derive(Debug, Clone)]
pub struct SpaceRetryPolicy {
    max_attempts: usize,
    interval: Duration,
}

impl SpaceRetryPolicy {
    pub fn new(max_attempts: usize, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Decide from the server error code of a failed `USE`.
    pub fn decide(&self, error_code: i32, attempt: usize) -> RetryDecision {
        if error_code != codes::E_SPACE_NOT_FOUND {
            return RetryDecision::Fail;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::Fail;
        }
        RetryDecision::Retry(self.interval)
    }
}

impl Default for SpaceRetryPolicy {
    fn default() -> Self {
        Self::new(40, Duration::from_secs(1))
    }
}

// ============================================================================
// TransientRetryPolicy
// ============================================================================

/// Outer per-query retry for classified transport failures.
///
/// Server-reported failures never qualify; only errors the taxonomy marks
/// retryable do.
#[derive(Debug, Clone)]
pub struct TransientRetryPolicy {
    max_attempts: usize,
}

impl TransientRetryPolicy {
    pub fn new(max_attempts: usize) -> Self {
        Self { max_attempts }
    }

    pub fn decide(&self, error: &DriverError, attempt: usize) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Fail;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::Fail;
        }
        RetryDecision::Retry(Duration::ZERO)
    }
}

impl Default for TransientRetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::error::TransportKind;

    #[test]
    fn test_space_policy_retries_only_space_not_found() {
        let policy = SpaceRetryPolicy::new(3, Duration::from_millis(10));

        assert_eq!(
            policy.decide(codes::E_SPACE_NOT_FOUND, 1),
            RetryDecision::Retry(Duration::from_millis(10))
        );
        assert_eq!(policy.decide(codes::E_SYNTAX_ERROR, 1), RetryDecision::Fail);
        assert_eq!(policy.decide(codes::E_BAD_PERMISSION, 1), RetryDecision::Fail);
    }

    #[test]
    fn test_space_policy_is_bounded() {
        let policy = SpaceRetryPolicy::new(3, Duration::from_millis(10));
        assert!(matches!(
            policy.decide(codes::E_SPACE_NOT_FOUND, 2),
            RetryDecision::Retry(_)
        ));
        assert_eq!(policy.decide(codes::E_SPACE_NOT_FOUND, 3), RetryDecision::Fail);
    }

    #[test]
    fn test_transient_policy() {
        let policy = TransientRetryPolicy::new(2);
        let transport = DriverError::Transport {
            kind: TransportKind::ConnectionBroken,
            message: "gone".into(),
        };
        assert!(matches!(policy.decide(&transport, 1), RetryDecision::Retry(_)));
        assert_eq!(policy.decide(&transport, 2), RetryDecision::Fail);

        let server = DriverError::client("syntax error");
        assert_eq!(policy.decide(&server, 1), RetryDecision::Fail);
    }
}

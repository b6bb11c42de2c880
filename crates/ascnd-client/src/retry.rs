//! Retry classification and exponential backoff for engine calls.

use std::time::Duration;

use tonic::Code;

/// Retry behaviour derived from a validated configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt (default: 3).
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further retry (default: 100ms).
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

/// What the engine should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then try again.
    Backoff(Duration),
    /// Give up and report the failure.
    Stop,
}

impl RetryPolicy {
    /// Decides whether attempt number `attempt` (0-indexed) that failed with
    /// `code` is followed by another attempt.
    pub fn decide(&self, code: Code, attempt: u32) -> RetryDecision {
        if !is_retryable(code) || attempt >= self.max_retries {
            return RetryDecision::Stop;
        }
        RetryDecision::Backoff(self.backoff(attempt))
    }

    /// Computes `base_delay * 2^attempt`, saturating at `Duration::MAX`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }
}

/// Check if a status code is transient.
///
/// Returns true for Unavailable, DeadlineExceeded, ResourceExhausted and
/// Aborted. Every other code is terminal.
pub fn is_retryable(code: Code) -> bool {
    matches!(
        code,
        Code::Unavailable | Code::DeadlineExceeded | Code::ResourceExhausted | Code::Aborted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(Code::Unavailable));
        assert!(is_retryable(Code::DeadlineExceeded));
        assert!(is_retryable(Code::ResourceExhausted));
        assert!(is_retryable(Code::Aborted));

        assert!(!is_retryable(Code::Ok));
        assert!(!is_retryable(Code::InvalidArgument));
        assert!(!is_retryable(Code::NotFound));
        assert!(!is_retryable(Code::PermissionDenied));
        assert!(!is_retryable(Code::Unauthenticated));
        assert!(!is_retryable(Code::Internal));
        assert!(!is_retryable(Code::Unknown));
        assert!(!is_retryable(Code::FailedPrecondition));
        assert!(!is_retryable(Code::Unimplemented));
    }

    #[test]
    fn test_compute_backoff() {
        let policy = RetryPolicy {
            max_retries: 5,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy {
            max_retries: u32::MAX,
            base_delay: Duration::from_secs(u64::MAX / 2),
        };
        assert_eq!(policy.backoff(40), Duration::MAX);
    }

    #[test]
    fn test_zero_base_delay_never_sleeps() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::ZERO,
        };
        assert_eq!(
            policy.decide(Code::Unavailable, 2),
            RetryDecision::Backoff(Duration::ZERO)
        );
    }

    #[test]
    fn test_decide_stops_on_terminal_code() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.decide(Code::NotFound, 0), RetryDecision::Stop);
        assert_eq!(policy.decide(Code::Unauthenticated, 0), RetryDecision::Stop);
    }

    #[test]
    fn test_decide_stops_when_budget_spent() {
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
        };
        assert_eq!(
            policy.decide(Code::Unavailable, 0),
            RetryDecision::Backoff(Duration::from_millis(10))
        );
        assert_eq!(
            policy.decide(Code::Unavailable, 1),
            RetryDecision::Backoff(Duration::from_millis(20))
        );
        assert_eq!(policy.decide(Code::Unavailable, 2), RetryDecision::Stop);
    }

    #[test]
    fn test_zero_retries_never_retries() {
        let policy = RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(10),
        };
        assert_eq!(policy.decide(Code::Unavailable, 0), RetryDecision::Stop);
    }
}

//! Transient-failure classification for the segment retry loop
//!
//! Retry policy lives in the task runner, not the fetcher; this module only
//! decides *whether* a given fetch failure is worth another attempt.

use crate::error::{FetchError, FetchErrorKind};

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, server errors) should
/// return `true`. Permanent failures (cancellation, missing segments) should
/// return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match &self.kind {
            FetchErrorKind::Timeout | FetchErrorKind::ConnectionReset => true,
            // A missing segment will not appear on a later attempt; every
            // other status (including 5xx and 429) gets the full budget.
            FetchErrorKind::HttpStatus(code) => *code != 404,
            FetchErrorKind::Cancelled => false,
            FetchErrorKind::Other(_) => true,
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn err(kind: FetchErrorKind) -> FetchError {
        FetchError {
            kind,
            partial_preserved: false,
        }
    }

    #[test]
    fn timeouts_and_resets_are_retryable() {
        assert!(err(FetchErrorKind::Timeout).is_retryable());
        assert!(err(FetchErrorKind::ConnectionReset).is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(err(FetchErrorKind::HttpStatus(500)).is_retryable());
        assert!(err(FetchErrorKind::HttpStatus(503)).is_retryable());
        assert!(err(FetchErrorKind::HttpStatus(429)).is_retryable());
    }

    #[test]
    fn missing_segment_is_not_retryable() {
        assert!(!err(FetchErrorKind::HttpStatus(404)).is_retryable());
    }

    #[test]
    fn cancellation_is_never_retried() {
        assert!(!err(FetchErrorKind::Cancelled).is_retryable());
    }

    #[test]
    fn unclassified_transport_failures_get_the_benefit_of_the_doubt() {
        assert!(err(FetchErrorKind::Other("stream error".to_string())).is_retryable());
    }
}

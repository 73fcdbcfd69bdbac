//! Broker error classification.
//!
//! Classification works on the error's display text: broker errors are
//! heterogeneous (HTTP status codes, API messages, transport failures)
//! and the substrings below are the stable part of each family.

/// Patterns that always stop retrying. Checked first: an error matching
/// both lists is non-retryable.
const NON_RETRYABLE_PATTERNS: &[&str] = &[
    "401",
    "403",
    "404",
    "400",
    "insufficient",
    "invalid symbol",
];

/// Patterns for transient failures worth retrying.
const RETRYABLE_PATTERNS: &[&str] = &[
    "timeout",
    "503",
    "500",
    "502",
    "429",
    "connection",
    "network",
];

/// Decide whether an order failure is worth retrying.
///
/// Unrecognized errors default to retryable: assume transient unless
/// proven otherwise.
pub fn is_retryable_error(message: &str) -> bool {
    let lowered = message.to_lowercase();

    if NON_RETRYABLE_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return false;
    }

    if RETRYABLE_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return true;
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_retryable_patterns() {
        for message in [
            "broker API error 401: unauthorized",
            "403 forbidden",
            "404 symbol not found",
            "400 bad request",
            "insufficient buying power",
            "Invalid Symbol: XYZ",
        ] {
            assert!(!is_retryable_error(message), "{message}");
        }
    }

    #[test]
    fn test_retryable_patterns() {
        for message in [
            "request timeout",
            "503 service unavailable",
            "500 internal server error",
            "502 bad gateway",
            "429 too many requests",
            "connection reset by peer",
            "network unreachable",
        ] {
            assert!(is_retryable_error(message), "{message}");
        }
    }

    #[test]
    fn test_unknown_defaults_to_retryable() {
        assert!(is_retryable_error("something novel went wrong"));
    }

    #[test]
    fn test_non_retryable_takes_precedence() {
        // Contains both "timeout" and "401"; the non-retryable token wins.
        assert!(!is_retryable_error("timeout while refreshing 401 credentials"));
    }
}

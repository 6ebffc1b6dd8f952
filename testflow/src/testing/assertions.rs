//! Test assertions for test results.

use crate::runner::TestResult;

/// Asserts that the test succeeded.
pub fn assert_test_succeeded(result: &TestResult) {
    assert!(
        result.success,
        "Expected test '{}' to succeed, got error: {:?}",
        result.name, result.error
    );
}

/// Asserts that the test failed with the given error kind.
pub fn assert_test_failed_with(result: &TestResult, kind: &str) {
    assert!(!result.success, "Expected test '{}' to fail", result.name);
    assert_eq!(
        result.error_kind.as_deref(),
        Some(kind),
        "Expected failure kind {kind} for test '{}', got {:?}",
        result.name,
        result.error
    );
}

//! Test case result.

use crate::errors::TestflowError;
use std::collections::HashMap;
use uuid::Uuid;

/// Result of a test case run.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// The test case name.
    pub name: String,
    /// The run id shared by every event of the run.
    pub run_id: Uuid,
    /// Whether every action succeeded.
    pub success: bool,
    /// Error message if failed.
    pub error: Option<String>,
    /// Error kind if failed, e.g. `ActionTimeout`.
    pub error_kind: Option<String>,
    /// Execution duration in milliseconds.
    pub duration_ms: f64,
}

impl TestResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(name: impl Into<String>, run_id: Uuid, duration_ms: f64) -> Self {
        Self {
            name: name.into(),
            run_id,
            success: true,
            error: None,
            error_kind: None,
            duration_ms,
        }
    }

    /// Creates a failed result.
    #[must_use]
    pub fn failure(
        name: impl Into<String>,
        run_id: Uuid,
        error: &TestflowError,
        duration_ms: f64,
    ) -> Self {
        Self {
            name: name.into(),
            run_id,
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind().to_string()),
            duration_ms,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("name".to_string(), serde_json::json!(self.name));
        map.insert("run_id".to_string(), serde_json::json!(self.run_id.to_string()));
        map.insert("success".to_string(), serde_json::json!(self.success));
        map.insert("duration_ms".to_string(), serde_json::json!(self.duration_ms));

        if let Some(ref error) = self.error {
            map.insert("error".to_string(), serde_json::json!(error));
        }
        if let Some(ref kind) = self.error_kind {
            map.insert("error_kind".to_string(), serde_json::json!(kind));
        }

        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_result() {
        let result = TestResult::success("t", Uuid::new_v4(), 12.0);
        assert!(result.success);
        assert!(result.error.is_none());
        assert!(!result.to_dict().contains_key("error"));
    }

    #[test]
    fn test_failure_result() {
        let err = TestflowError::timeout("no reply", 100);
        let result = TestResult::failure("t", Uuid::new_v4(), &err, 100.0);

        assert!(!result.success);
        assert_eq!(result.error_kind.as_deref(), Some("ActionTimeout"));

        let dict = result.to_dict();
        assert_eq!(dict["error_kind"], serde_json::json!("ActionTimeout"));
        assert_eq!(dict["success"], serde_json::json!(false));
    }
}

//! Test event type emitted for action lifecycle and correlation outcomes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Event type for an action that begins executing.
pub const ACTION_STARTED: &str = "action-started";
/// Event type for an action that completed without error.
pub const ACTION_SUCCEEDED: &str = "action-succeeded";
/// Event type for an action that failed.
pub const ACTION_FAILED: &str = "action-failed";
/// Event type for a receive that gave up waiting for a correlated reply.
pub const CORRELATION_TIMEOUT: &str = "correlation-timeout";
/// Event type for the start of a test case.
pub const TEST_STARTED: &str = "test-started";
/// Event type for the end of a test case.
pub const TEST_FINISHED: &str = "test-finished";
/// Event type carrying the output of an echo action.
pub const ECHO: &str = "echo";

/// An event emitted by the engine during test execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestEvent {
    /// The event type (e.g., "action-started").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl TestEvent {
    /// Creates a new event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns a data field as a string slice.
    #[must_use]
    pub fn data_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Creates an "action-started" event.
    #[must_use]
    pub fn action_started(action: &str) -> Self {
        Self::new(ACTION_STARTED).add_data("action", serde_json::json!(action))
    }

    /// Creates an "action-succeeded" event.
    #[must_use]
    pub fn action_succeeded(action: &str, duration_ms: f64) -> Self {
        Self::new(ACTION_SUCCEEDED)
            .add_data("action", serde_json::json!(action))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates an "action-failed" event.
    #[must_use]
    pub fn action_failed(action: &str, reason: &str, duration_ms: f64) -> Self {
        Self::new(ACTION_FAILED)
            .add_data("action", serde_json::json!(action))
            .add_data("reason", serde_json::json!(reason))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates a "correlation-timeout" event.
    #[must_use]
    pub fn correlation_timeout(key_name: &str, key_value: &str) -> Self {
        Self::new(CORRELATION_TIMEOUT)
            .add_data("keyName", serde_json::json!(key_name))
            .add_data("keyValue", serde_json::json!(key_value))
    }

    /// Creates a "test-started" event.
    #[must_use]
    pub fn test_started(test: &str) -> Self {
        Self::new(TEST_STARTED).add_data("test", serde_json::json!(test))
    }

    /// Creates a "test-finished" event.
    #[must_use]
    pub fn test_finished(test: &str, success: bool, duration_ms: f64) -> Self {
        Self::new(TEST_FINISHED)
            .add_data("test", serde_json::json!(test))
            .add_data("success", serde_json::json!(success))
            .add_data("duration_ms", serde_json::json!(duration_ms))
    }

    /// Creates an "echo" event.
    #[must_use]
    pub fn echo(message: &str) -> Self {
        Self::new(ECHO).add_data("message", serde_json::json!(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_failed_carries_reason() {
        let event = TestEvent::action_failed("receive", "timeout", 12.5);
        assert_eq!(event.event_type, ACTION_FAILED);
        assert_eq!(event.data_str("reason"), Some("timeout"));
        assert_eq!(event.data.get("duration_ms"), Some(&serde_json::json!(12.5)));
    }

    #[test]
    fn test_correlation_timeout_keys() {
        let event = TestEvent::correlation_timeout("reply_key", "abc");
        assert_eq!(event.data_str("keyName"), Some("reply_key"));
        assert_eq!(event.data_str("keyValue"), Some("abc"));
    }

    #[test]
    fn test_event_serialization() {
        let event = TestEvent::echo("hello");
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"echo\""));

        let deserialized: TestEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.data_str("message"), Some("hello"));
    }
}

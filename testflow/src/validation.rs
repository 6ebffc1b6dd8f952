//! Validation of received messages against expectations.
//!
//! Expected values follow the same rules everywhere: a string is either a
//! matcher expression (`@contains('x')@`) or a value resolved in the
//! receiving context and compared with the actual value's text form.

use crate::context::TestContext;
use crate::errors::TestflowError;
use crate::message::Message;
use crate::variables::value_as_text;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a received message is expected to contain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageExpectation {
    /// Expected payload, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Expected header values.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
}

impl MessageExpectation {
    /// Creates an empty expectation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the expected payload.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Adds an expected header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, expected: impl Into<String>) -> Self {
        self.headers.insert(name.into(), expected.into());
        self
    }

    /// Returns true if nothing is expected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_none() && self.headers.is_empty()
    }
}

/// Validates a received message.
pub trait MessageValidator: Send + Sync {
    /// Checks `actual` against `expectation`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` describing the first mismatch.
    fn validate(
        &self,
        expectation: &MessageExpectation,
        actual: &Message,
        ctx: &TestContext,
    ) -> Result<(), TestflowError>;
}

/// Structural JSON validator.
///
/// Objects are compared key by key and arrays element by element. In strict
/// mode the actual object may not carry keys the expectation does not name.
#[derive(Debug, Clone, Copy)]
pub struct JsonMessageValidator {
    strict: bool,
}

impl JsonMessageValidator {
    /// Creates a strict validator.
    #[must_use]
    pub fn new() -> Self {
        Self { strict: true }
    }

    /// Creates a validator that ignores unexpected object keys.
    #[must_use]
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    fn compare(
        &self,
        path: &str,
        expected: &Value,
        actual: &Value,
        ctx: &TestContext,
    ) -> Result<(), TestflowError> {
        match (expected, actual) {
            (Value::String(expected), actual) => ctx.validate(path, expected, &value_as_text(actual)),
            (Value::Object(expected), Value::Object(actual)) => {
                for (key, expected_item) in expected {
                    let item_path = format!("{path}.{key}");
                    let actual_item = actual.get(key).ok_or_else(|| {
                        TestflowError::validation(format!("missing field '{item_path}'"))
                    })?;
                    self.compare(&item_path, expected_item, actual_item, ctx)?;
                }
                if self.strict {
                    if let Some(extra) = actual.keys().find(|key| !expected.contains_key(*key)) {
                        return Err(TestflowError::validation(format!(
                            "unexpected field '{path}.{extra}'"
                        )));
                    }
                }
                Ok(())
            }
            (Value::Array(expected), Value::Array(actual)) => {
                if expected.len() != actual.len() {
                    return Err(TestflowError::validation(format!(
                        "array at '{path}' has {} elements but expected {}",
                        actual.len(),
                        expected.len()
                    )));
                }
                for (index, (expected_item, actual_item)) in expected.iter().zip(actual).enumerate() {
                    self.compare(&format!("{path}[{index}]"), expected_item, actual_item, ctx)?;
                }
                Ok(())
            }
            (expected, actual) if expected == actual => Ok(()),
            (expected, actual) => Err(TestflowError::validation(format!(
                "value at '{path}' was {actual} but expected {expected}"
            ))),
        }
    }
}

impl Default for JsonMessageValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageValidator for JsonMessageValidator {
    fn validate(
        &self,
        expectation: &MessageExpectation,
        actual: &Message,
        ctx: &TestContext,
    ) -> Result<(), TestflowError> {
        for (name, expected) in &expectation.headers {
            let path = format!("header:{name}");
            let value = actual
                .header_text(name)
                .ok_or_else(|| TestflowError::validation(format!("missing header '{name}'")))?;
            ctx.validate(&path, expected, &value)?;
        }

        if let Some(ref payload) = expectation.payload {
            self.compare("$", payload, &actual.payload, ctx)?;
        }

        Ok(())
    }
}

//! Variables and dynamic value resolution.
//!
//! This module provides:
//! - The ordered, thread-safe [`VariableStore`]
//! - Single-pass resolution of `${name}` references and `core:function(...)` calls
//! - The test-wide [`FunctionLibrary`] and [`ValidationMatcherLibrary`]

mod functions;
mod matchers;
mod resolver;
mod store;

pub use functions::{FunctionHandler, FunctionLibrary, DEFAULT_FUNCTION_PREFIX};
pub use matchers::{MatcherHandler, ValidationMatcherLibrary, MATCHER_DELIMITER};
pub use resolver::{resolve_text, resolve_value};
pub use store::VariableStore;

use serde_json::Value;

/// Returns the text form of a variable value.
///
/// Strings are returned without quotes, `null` becomes the empty string and
/// structured values are rendered as compact JSON.
#[must_use]
pub fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_text() {
        assert_eq!(value_as_text(&json!("plain")), "plain");
        assert_eq!(value_as_text(&json!(42)), "42");
        assert_eq!(value_as_text(&json!(true)), "true");
        assert_eq!(value_as_text(&Value::Null), "");
        assert_eq!(value_as_text(&json!({"a": 1})), r#"{"a":1}"#);
    }
}

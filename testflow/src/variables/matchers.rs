//! Validation matchers for received values.
//!
//! An expected value wrapped in `@` delimiters is a matcher expression, for
//! example `@contains('order')@` or `@ignore@`. Any other expected value is
//! resolved and compared for equality.

use super::resolver::{split_arguments, unquote};
use crate::context::TestContext;
use crate::errors::TestflowError;
use anyhow::bail;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Delimiter marking a matcher expression.
pub const MATCHER_DELIMITER: char = '@';

/// A matcher implementation receiving the actual value and resolved arguments.
pub type MatcherHandler = Arc<dyn Fn(&str, &[String]) -> anyhow::Result<bool> + Send + Sync>;

/// A named set of validation matchers.
#[derive(Clone)]
pub struct ValidationMatcherLibrary {
    name: String,
    matchers: HashMap<String, MatcherHandler>,
}

impl ValidationMatcherLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            matchers: HashMap::new(),
        }
    }

    /// Creates the built-in library.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new("core")
            .with_matcher("ignore", |_, _| Ok(true))
            .with_matcher("equalsIgnoreCase", |actual, args| {
                Ok(actual.to_lowercase() == expect_one(args, "equalsIgnoreCase")?.to_lowercase())
            })
            .with_matcher("contains", |actual, args| {
                Ok(actual.contains(expect_one(args, "contains")?))
            })
            .with_matcher("startsWith", |actual, args| {
                Ok(actual.starts_with(expect_one(args, "startsWith")?))
            })
            .with_matcher("endsWith", |actual, args| {
                Ok(actual.ends_with(expect_one(args, "endsWith")?))
            })
            .with_matcher("matches", |actual, args| {
                let pattern = format!("^(?:{})$", expect_one(args, "matches")?);
                Ok(regex::Regex::new(&pattern)?.is_match(actual))
            })
            .with_matcher("isNumber", |actual, _| Ok(actual.trim().parse::<f64>().is_ok()))
            .with_matcher("greaterThan", |actual, args| {
                Ok(number(actual)? > number(expect_one(args, "greaterThan")?)?)
            })
            .with_matcher("lowerThan", |actual, args| {
                Ok(number(actual)? < number(expect_one(args, "lowerThan")?)?)
            })
    }

    /// Registers a matcher, replacing any matcher with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, matcher: F)
    where
        F: Fn(&str, &[String]) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.matchers.insert(name.into(), Arc::new(matcher));
    }

    /// Registers a matcher and returns the library.
    #[must_use]
    pub fn with_matcher<F>(mut self, name: impl Into<String>, matcher: F) -> Self
    where
        F: Fn(&str, &[String]) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        self.register(name, matcher);
        self
    }

    /// Returns the library name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Checks if a matcher is registered.
    #[must_use]
    pub fn knows(&self, name: &str) -> bool {
        self.matchers.contains_key(name)
    }

    /// Returns true if `expected` is a matcher expression.
    #[must_use]
    pub fn is_matcher_expression(expected: &str) -> bool {
        let trimmed = expected.trim();
        trimmed.len() >= 2
            && trimmed.starts_with(MATCHER_DELIMITER)
            && trimmed.ends_with(MATCHER_DELIMITER)
    }

    /// Checks `actual` against an expected value or matcher expression.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for unknown or failing matchers, and resolution
    /// errors for expected values that cannot be resolved.
    pub fn matches(
        &self,
        expected: &str,
        actual: &str,
        ctx: &TestContext,
    ) -> Result<bool, TestflowError> {
        if !Self::is_matcher_expression(expected) {
            return Ok(ctx.resolve(expected)? == actual);
        }

        let trimmed = expected.trim();
        let inner = &trimmed[1..trimmed.len() - 1];
        let (name, raw_args) = match inner.find('(') {
            Some(open) => {
                let Some(raw) = inner[open + 1..].strip_suffix(')') else {
                    return Err(TestflowError::validation(format!(
                        "malformed matcher expression '{expected}'"
                    )));
                };
                (inner[..open].trim(), raw)
            }
            None => (inner.trim(), ""),
        };

        let matcher = self.matchers.get(name).ok_or_else(|| {
            TestflowError::validation(format!(
                "unknown validation matcher '{name}' in library '{}'",
                self.name
            ))
        })?;

        let args = split_arguments(raw_args)
            .into_iter()
            .map(|arg| ctx.resolve(unquote(arg)))
            .collect::<Result<Vec<_>, _>>()?;

        matcher(actual, &args)
            .map_err(|e| TestflowError::validation(format!("matcher '{name}' failed: {e:#}")))
    }

    /// Validates `actual` at `path`, failing with a descriptive error.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when the value does not match.
    pub fn validate(
        &self,
        path: &str,
        expected: &str,
        actual: &str,
        ctx: &TestContext,
    ) -> Result<(), TestflowError> {
        if self.matches(expected, actual, ctx)? {
            Ok(())
        } else {
            Err(TestflowError::validation(format!(
                "value at '{path}' was '{actual}' but expected '{expected}'"
            )))
        }
    }
}

impl Default for ValidationMatcherLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for ValidationMatcherLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.matchers.keys().collect();
        names.sort();
        f.debug_struct("ValidationMatcherLibrary")
            .field("name", &self.name)
            .field("matchers", &names)
            .finish()
    }
}

fn expect_one<'a>(args: &'a [String], matcher: &str) -> anyhow::Result<&'a str> {
    match args {
        [value] => Ok(value),
        _ => bail!("{matcher} expects 1 argument, got {}", args.len()),
    }
}

fn number(value: &str) -> anyhow::Result<f64> {
    match value.trim().parse::<f64>() {
        Ok(n) => Ok(n),
        Err(_) => bail!("'{value}' is not a number"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(expected: &str, actual: &str) -> Result<bool, TestflowError> {
        let ctx = TestContext::new();
        ctx.set_variable("prefix", "ord");
        ValidationMatcherLibrary::builtin().matches(expected, actual, &ctx)
    }

    #[test]
    fn test_plain_expected_value_is_resolved() {
        assert!(check("order", "order").unwrap());
        assert!(check("${prefix}er", "order").unwrap());
        assert!(!check("other", "order").unwrap());
    }

    #[test]
    fn test_builtin_matchers() {
        assert!(check("@ignore@", "anything").unwrap());
        assert!(check("@equalsIgnoreCase('ORDER')@", "order").unwrap());
        assert!(check("@contains('rde')@", "order").unwrap());
        assert!(check("@startsWith('${prefix}')@", "order").unwrap());
        assert!(check("@endsWith('der')@", "order").unwrap());
        assert!(check("@matches('[a-z]+-[0-9]+')@", "abc-42").unwrap());
        assert!(!check("@matches('[a-z]+')@", "abc-42").unwrap());
        assert!(check("@isNumber()@", "4.2").unwrap());
        assert!(check("@greaterThan('3')@", "4").unwrap());
        assert!(check("@lowerThan('3')@", "2").unwrap());
    }

    #[test]
    fn test_unknown_matcher_fails() {
        let err = check("@nope('x')@", "x").unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn test_matcher_error_is_validation_error() {
        let err = check("@greaterThan('3')@", "abc").unwrap_err();
        assert!(err.to_string().contains("is not a number"));
    }

    #[test]
    fn test_validate_reports_path() {
        let ctx = TestContext::new();
        let err = ValidationMatcherLibrary::builtin()
            .validate("payload.status", "OK", "FAILED", &ctx)
            .unwrap_err();
        assert!(err.to_string().contains("payload.status"));
    }
}

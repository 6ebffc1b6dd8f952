//! Function library used by dynamic value resolution.

use crate::context::TestContext;
use crate::errors::TestflowError;
use anyhow::{anyhow, bail};
use base64::Engine as _;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Prefix of the built-in function library: `core:concat(...)`.
pub const DEFAULT_FUNCTION_PREFIX: &str = "core";

/// A function implementation.
///
/// Receives the already resolved arguments and the calling context.
pub type FunctionHandler =
    Arc<dyn Fn(&[String], &TestContext) -> anyhow::Result<String> + Send + Sync>;

/// A named set of functions callable as `<prefix>:<name>(args)`.
///
/// The library is shared read-only by every context of a test run. All
/// built-in functions are pure: their output depends only on their
/// arguments.
#[derive(Clone)]
pub struct FunctionLibrary {
    name: String,
    prefix: String,
    functions: HashMap<String, FunctionHandler>,
}

impl FunctionLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new(name: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            functions: HashMap::new(),
        }
    }

    /// Creates the built-in library.
    #[must_use]
    pub fn builtin() -> Self {
        Self::new("core", DEFAULT_FUNCTION_PREFIX)
            .with_function("concat", |args, _| Ok(args.concat()))
            .with_function("upperCase", |args, _| Ok(single(args, "upperCase")?.to_uppercase()))
            .with_function("lowerCase", |args, _| Ok(single(args, "lowerCase")?.to_lowercase()))
            .with_function("trim", |args, _| Ok(single(args, "trim")?.trim().to_string()))
            .with_function("stringLength", |args, _| {
                Ok(single(args, "stringLength")?.chars().count().to_string())
            })
            .with_function("substring", |args, _| substring(args))
            .with_function("translate", |args, _| {
                let [text, pattern, replacement] = args else {
                    bail!("translate expects 3 arguments, got {}", args.len());
                };
                let regex = regex::Regex::new(pattern)?;
                Ok(regex.replace_all(text, replacement.as_str()).into_owned())
            })
            .with_function("encodeBase64", |args, _| {
                Ok(base64::engine::general_purpose::STANDARD.encode(single(args, "encodeBase64")?))
            })
            .with_function("decodeBase64", |args, _| {
                let bytes = base64::engine::general_purpose::STANDARD.decode(single(args, "decodeBase64")?)?;
                Ok(String::from_utf8(bytes)?)
            })
            .with_function("sum", |args, _| Ok(format_number(numbers(args)?.iter().sum())))
            .with_function("absolute", |args, _| {
                Ok(format_number(parse_number(single(args, "absolute")?)?.abs()))
            })
            .with_function("max", |args, _| {
                numbers(args)?
                    .into_iter()
                    .reduce(f64::max)
                    .map(format_number)
                    .ok_or_else(|| anyhow!("max expects at least one argument"))
            })
            .with_function("min", |args, _| {
                numbers(args)?
                    .into_iter()
                    .reduce(f64::min)
                    .map(format_number)
                    .ok_or_else(|| anyhow!("min expects at least one argument"))
            })
    }

    /// Sets the call prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Registers a function, replacing any function with the same name.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[String], &TestContext) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    /// Registers a function and returns the library.
    #[must_use]
    pub fn with_function<F>(mut self, name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[String], &TestContext) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.register(name, function);
        self
    }

    /// Returns the library name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the call prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Checks if a function is registered.
    #[must_use]
    pub fn knows(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Returns all function names, sorted.
    #[must_use]
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.functions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Evaluates a function with resolved arguments.
    ///
    /// # Errors
    ///
    /// Returns `FunctionEvaluation` if the function is unknown or fails.
    pub fn evaluate(
        &self,
        name: &str,
        args: &[String],
        ctx: &TestContext,
    ) -> Result<String, TestflowError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| TestflowError::FunctionEvaluation {
                function: name.to_string(),
                reason: format!("unknown function in library '{}'", self.name),
            })?;

        function(args, ctx).map_err(|e| TestflowError::FunctionEvaluation {
            function: name.to_string(),
            reason: format!("{e:#}"),
        })
    }
}

impl Default for FunctionLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionLibrary")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("functions", &self.function_names())
            .finish()
    }
}

fn single<'a>(args: &'a [String], function: &str) -> anyhow::Result<&'a str> {
    match args {
        [value] => Ok(value),
        _ => bail!("{function} expects 1 argument, got {}", args.len()),
    }
}

fn substring(args: &[String]) -> anyhow::Result<String> {
    let (text, begin, end) = match args {
        [text, begin] => (text, begin, None),
        [text, begin, end] => (text, begin, Some(end)),
        _ => bail!("substring expects 2 or 3 arguments, got {}", args.len()),
    };

    let chars: Vec<char> = text.chars().collect();
    let begin: usize = begin.trim().parse()?;
    let end: usize = match end {
        Some(end) => end.trim().parse()?,
        None => chars.len(),
    };

    if begin > end || end > chars.len() {
        bail!("substring range {begin}..{end} out of bounds for length {}", chars.len());
    }

    Ok(chars[begin..end].iter().collect())
}

fn parse_number(value: &str) -> anyhow::Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| anyhow!("'{value}' is not a number"))
}

fn numbers(args: &[String]) -> anyhow::Result<Vec<f64>> {
    args.iter().map(|arg| parse_number(arg)).collect()
}

#[allow(clippy::cast_possible_truncation)]
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(name: &str, args: &[&str]) -> Result<String, TestflowError> {
        let ctx = TestContext::new();
        let args: Vec<String> = args.iter().map(|s| (*s).to_string()).collect();
        FunctionLibrary::builtin().evaluate(name, &args, &ctx)
    }

    #[test]
    fn test_string_functions() {
        assert_eq!(eval("concat", &["a", "b", "c"]).unwrap(), "abc");
        assert_eq!(eval("upperCase", &["abc"]).unwrap(), "ABC");
        assert_eq!(eval("lowerCase", &["ABC"]).unwrap(), "abc");
        assert_eq!(eval("trim", &["  x "]).unwrap(), "x");
        assert_eq!(eval("stringLength", &["héllo"]).unwrap(), "5");
    }

    #[test]
    fn test_substring() {
        assert_eq!(eval("substring", &["testflow", "4"]).unwrap(), "flow");
        assert_eq!(eval("substring", &["testflow", "0", "4"]).unwrap(), "test");
        assert!(eval("substring", &["abc", "2", "9"]).is_err());
    }

    #[test]
    fn test_translate() {
        assert_eq!(eval("translate", &["a-b-c", "-", "+"]).unwrap(), "a+b+c");
        assert!(eval("translate", &["a", "("]).is_err());
    }

    #[test]
    fn test_base64() {
        assert_eq!(eval("encodeBase64", &["hello"]).unwrap(), "aGVsbG8=");
        assert_eq!(eval("decodeBase64", &["aGVsbG8="]).unwrap(), "hello");
    }

    #[test]
    fn test_numeric_functions() {
        assert_eq!(eval("sum", &["1", "2", "3.5"]).unwrap(), "6.5");
        assert_eq!(eval("sum", &["1", "2"]).unwrap(), "3");
        assert_eq!(eval("absolute", &["-4"]).unwrap(), "4");
        assert_eq!(eval("max", &["1", "9", "3"]).unwrap(), "9");
        assert_eq!(eval("min", &["1", "9", "-3"]).unwrap(), "-3");
        assert!(eval("sum", &["x"]).is_err());
    }

    #[test]
    fn test_wrong_arity_is_function_error() {
        let err = eval("upperCase", &[]).unwrap_err();
        assert_eq!(err.kind(), "FunctionEvaluationError");
        assert!(err.to_string().contains("expects 1 argument"));
    }

    #[test]
    fn test_custom_function() {
        let library = FunctionLibrary::new("custom", "my").with_function("greet", |args, ctx| {
            let greeting = ctx.variables().get_opt("greeting").map_or_else(
                || "Hello".to_string(),
                |v| crate::variables::value_as_text(&v),
            );
            Ok(format!("{greeting} {}", args.join(" ")))
        });
        let ctx = TestContext::new().with_functions(Arc::new(library));
        ctx.set_variable("greeting", "Hi");

        assert_eq!(ctx.resolve("my:greet('Ada')").unwrap(), "Hi Ada");
        assert!(ctx.resolve("core:concat('a')").unwrap() == "core:concat('a')");
    }
}

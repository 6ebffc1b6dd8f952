//! Single-pass resolution of dynamic values.
//!
//! Text is scanned once from left to right. `${name}` references and
//! `<prefix>:<function>(args)` calls are replaced by their values; replaced
//! values are never scanned again, so a variable holding `${other}` is
//! emitted verbatim.

use super::value_as_text;
use crate::context::TestContext;
use crate::errors::TestflowError;
use serde_json::Value;

/// Separator between a variable name and its fallback: `${name:-fallback}`.
const FALLBACK_SEPARATOR: &str = ":-";

/// Resolves all variable references and function calls in `text`.
///
/// # Errors
///
/// Returns `UnresolvableReference` for undefined variables without a
/// fallback or unterminated references, and `FunctionEvaluation` for failing
/// or unknown functions.
pub fn resolve_text(text: &str, ctx: &TestContext) -> Result<String, TestflowError> {
    let prefix = ctx.functions().prefix();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];

        if rest.starts_with("${") {
            let end = rest.find('}').ok_or_else(|| TestflowError::UnresolvableReference {
                reference: rest.to_string(),
                reason: "unterminated variable reference".to_string(),
            })?;
            out.push_str(&resolve_variable(&rest[2..end], ctx)?);
            i += end + 1;
            continue;
        }

        if at_word_boundary(text, i) {
            if let Some(call) = parse_function_call(rest, prefix) {
                let args = call
                    .arguments()
                    .into_iter()
                    .map(|arg| resolve_text(unquote(arg), ctx))
                    .collect::<Result<Vec<_>, _>>()?;
                out.push_str(&ctx.functions().evaluate(call.name, &args, ctx)?);
                i += call.consumed;
                continue;
            }
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        out.push(ch);
        i += ch.len_utf8();
    }

    Ok(out)
}

/// Resolves every string inside a JSON value.
///
/// Object keys are kept as written; only values are resolved.
pub fn resolve_value(value: &Value, ctx: &TestContext) -> Result<Value, TestflowError> {
    match value {
        Value::String(text) => Ok(Value::String(resolve_text(text, ctx)?)),
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| resolve_value(item, ctx))
                .collect::<Result<_, _>>()?,
        )),
        Value::Object(map) => {
            let mut resolved = serde_json::Map::with_capacity(map.len());
            for (key, item) in map {
                resolved.insert(key.clone(), resolve_value(item, ctx)?);
            }
            Ok(Value::Object(resolved))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_variable(expression: &str, ctx: &TestContext) -> Result<String, TestflowError> {
    let (name, fallback) = match expression.split_once(FALLBACK_SEPARATOR) {
        Some((name, fallback)) => (name.trim(), Some(fallback)),
        None => (expression.trim(), None),
    };

    if name.is_empty() {
        return Err(TestflowError::UnresolvableReference {
            reference: format!("${{{expression}}}"),
            reason: "empty variable name".to_string(),
        });
    }

    match (ctx.variables().get_opt(name), fallback) {
        (Some(value), _) => Ok(value_as_text(&value)),
        (None, Some(fallback)) => Ok(fallback.to_string()),
        (None, None) => Err(TestflowError::UnresolvableReference {
            reference: format!("${{{name}}}"),
            reason: format!("variable '{name}' is not defined"),
        }),
    }
}

fn at_word_boundary(text: &str, index: usize) -> bool {
    text[..index]
        .chars()
        .next_back()
        .map_or(true, |prev| !(prev.is_alphanumeric() || prev == '_'))
}

/// A function call found in the source text.
struct FunctionCall<'a> {
    name: &'a str,
    raw_arguments: &'a str,
    consumed: usize,
}

impl<'a> FunctionCall<'a> {
    fn arguments(&self) -> Vec<&'a str> {
        split_arguments(self.raw_arguments)
    }
}

fn parse_function_call<'a>(rest: &'a str, prefix: &str) -> Option<FunctionCall<'a>> {
    let after_prefix = rest.strip_prefix(prefix)?.strip_prefix(':')?;
    let name_len = after_prefix
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(after_prefix.len());
    if name_len == 0 {
        return None;
    }

    let name = &after_prefix[..name_len];
    let open = prefix.len() + 1 + name_len;
    if !rest[open..].starts_with('(') {
        return None;
    }

    let close = find_closing_paren(rest, open)?;
    Some(FunctionCall {
        name,
        raw_arguments: &rest[open + 1..close],
        consumed: close + 1,
    })
}

/// Finds the parenthesis closing the one at `open`, skipping quoted text and
/// `${...}` references.
fn find_closing_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut in_reference = false;
    let mut previous = '\0';

    for (offset, ch) in text[open..].char_indices() {
        let index = open + offset;
        match ch {
            '\'' if !in_reference => in_quote = !in_quote,
            '{' if previous == '$' && !in_quote => in_reference = true,
            '}' if in_reference => in_reference = false,
            '(' if !in_quote && !in_reference => depth += 1,
            ')' if !in_quote && !in_reference => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => {}
        }
        previous = ch;
    }

    None
}

/// Splits a raw argument list on top-level commas.
pub(crate) fn split_arguments(raw: &str) -> Vec<&str> {
    if raw.trim().is_empty() {
        return Vec::new();
    }

    let mut arguments = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;

    for (index, ch) in raw.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth = depth.saturating_sub(1),
            ',' if !in_quote && depth == 0 => {
                arguments.push(raw[start..index].trim());
                start = index + 1;
            }
            _ => {}
        }
    }
    arguments.push(raw[start..].trim());

    arguments
}

/// Strips one pair of surrounding single quotes.
pub(crate) fn unquote(argument: &str) -> &str {
    argument
        .strip_prefix('\'')
        .and_then(|inner| inner.strip_suffix('\''))
        .unwrap_or(argument)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn context() -> TestContext {
        let ctx = TestContext::new();
        ctx.set_variable("name", "World");
        ctx.set_variable("count", 3);
        ctx.set_variable("nested", "${name}");
        ctx
    }

    #[test]
    fn test_plain_text_is_unchanged() {
        let ctx = context();
        assert_eq!(resolve_text("no references here", &ctx).unwrap(), "no references here");
        assert_eq!(resolve_text("costs $5", &ctx).unwrap(), "costs $5");
    }

    #[test]
    fn test_variable_reference() {
        let ctx = context();
        assert_eq!(resolve_text("Hello ${name}!", &ctx).unwrap(), "Hello World!");
        assert_eq!(resolve_text("${count}${count}", &ctx).unwrap(), "33");
    }

    #[test]
    fn test_undefined_variable_fails() {
        let ctx = context();
        let err = resolve_text("Hello ${missing}", &ctx).unwrap_err();
        assert_eq!(err.kind(), "UnresolvableReference");
    }

    #[test]
    fn test_fallback_for_undefined_variable() {
        let ctx = context();
        assert_eq!(resolve_text("${missing:-guest}", &ctx).unwrap(), "guest");
        assert_eq!(resolve_text("${name:-guest}", &ctx).unwrap(), "World");
    }

    #[test]
    fn test_unterminated_reference_fails() {
        let ctx = context();
        assert!(resolve_text("Hello ${name", &ctx).is_err());
    }

    #[test]
    fn test_resolution_is_not_recursive() {
        let ctx = context();
        assert_eq!(resolve_text("${nested}", &ctx).unwrap(), "${name}");
    }

    #[test]
    fn test_resolution_is_idempotent_on_resolved_text() {
        let ctx = context();
        let once = resolve_text("Hello ${name}, core:upperCase('${name}')", &ctx).unwrap();
        let twice = resolve_text(&once, &ctx).unwrap();
        assert_eq!(once, "Hello World, WORLD");
        assert_eq!(twice, once);
    }

    #[test]
    fn test_function_call() {
        let ctx = context();
        assert_eq!(
            resolve_text("core:concat('Hello ', ${name}, '!')", &ctx).unwrap(),
            "Hello World!"
        );
    }

    #[test]
    fn test_nested_function_call() {
        let ctx = context();
        assert_eq!(
            resolve_text("core:lowerCase(core:concat('A', 'B'))", &ctx).unwrap(),
            "ab"
        );
    }

    #[test]
    fn test_quoted_argument_keeps_commas_and_parens() {
        let ctx = context();
        assert_eq!(resolve_text("core:concat('a, (b)', 'c')", &ctx).unwrap(), "a, (b)c");
    }

    #[test]
    fn test_unknown_function_fails() {
        let ctx = context();
        let err = resolve_text("core:doesNotExist()", &ctx).unwrap_err();
        assert_eq!(err.kind(), "FunctionEvaluationError");
    }

    #[test]
    fn test_prefix_inside_word_is_literal() {
        let ctx = context();
        assert_eq!(resolve_text("score:concat('a')", &ctx).unwrap(), "score:concat('a')");
    }

    #[test]
    fn test_resolve_value_walks_structures() {
        let ctx = context();
        let value = json!({
            "greeting": "Hello ${name}",
            "items": ["${count}", 7],
            "${name}": true,
        });

        let resolved = resolve_value(&value, &ctx).unwrap();
        assert_eq!(resolved["greeting"], "Hello World");
        assert_eq!(resolved["items"], json!(["3", 7]));
        assert_eq!(resolved["${name}"], true);
    }

    #[test]
    fn test_split_arguments() {
        assert_eq!(split_arguments("'a', b , core:f(1, 2)"), vec!["'a'", "b", "core:f(1, 2)"]);
        assert!(split_arguments("  ").is_empty());
    }
}

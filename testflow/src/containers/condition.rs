//! Loop condition evaluation.
//!
//! A condition is `<lhs> <op> <rhs>` with `op` one of `<`, `<=`, `>`, `>=`,
//! `=`, `==` or `!=`, or a bare `true`/`false`. Both sides are compared as
//! numbers when they both parse as numbers and as text otherwise.

use crate::errors::TestflowError;
use std::cmp::Ordering;

const OPERATORS: [&str; 7] = ["<=", ">=", "!=", "==", "<", ">", "="];

/// Evaluates an already resolved condition.
///
/// # Errors
///
/// Returns `InvalidCondition` if the text has no operator or an empty side.
pub fn evaluate_condition(condition: &str) -> Result<bool, TestflowError> {
    let trimmed = condition.trim();
    match trimmed {
        "true" => return Ok(true),
        "false" => return Ok(false),
        _ => {}
    }

    let (index, operator) = find_operator(trimmed).ok_or_else(|| invalid(condition, "no comparison operator"))?;
    let lhs = trimmed[..index].trim();
    let rhs = trimmed[index + operator.len()..].trim();
    if lhs.is_empty() || rhs.is_empty() {
        return Err(invalid(condition, "missing operand"));
    }

    let ordering = match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
        (Ok(l), Ok(r)) => l
            .partial_cmp(&r)
            .ok_or_else(|| invalid(condition, "operands are not comparable"))?,
        _ => lhs.cmp(rhs),
    };

    Ok(match operator {
        "<" => ordering == Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        ">" => ordering == Ordering::Greater,
        ">=" => ordering != Ordering::Less,
        "!=" => ordering != Ordering::Equal,
        _ => ordering == Ordering::Equal,
    })
}

fn find_operator(text: &str) -> Option<(usize, &'static str)> {
    text.char_indices().find_map(|(index, _)| {
        OPERATORS
            .iter()
            .find(|op| text[index..].starts_with(**op))
            .map(|op| (index, *op))
    })
}

fn invalid(condition: &str, reason: &str) -> TestflowError {
    TestflowError::InvalidCondition {
        condition: condition.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_comparisons() {
        assert!(evaluate_condition("1 < 2").unwrap());
        assert!(evaluate_condition("2 <= 2").unwrap());
        assert!(!evaluate_condition("3 <= 2").unwrap());
        assert!(evaluate_condition("10 > 9").unwrap());
        assert!(evaluate_condition("2.0 = 2").unwrap());
        assert!(evaluate_condition("2 == 2").unwrap());
        assert!(evaluate_condition("2 != 3").unwrap());
        assert!(evaluate_condition("5>=5").unwrap());
    }

    #[test]
    fn test_text_comparisons() {
        assert!(evaluate_condition("open = open").unwrap());
        assert!(evaluate_condition("open != closed").unwrap());
        assert!(!evaluate_condition("10 = ten").unwrap());
    }

    #[test]
    fn test_literals() {
        assert!(evaluate_condition(" true ").unwrap());
        assert!(!evaluate_condition("false").unwrap());
    }

    #[test]
    fn test_invalid_conditions() {
        assert_eq!(evaluate_condition("maybe").unwrap_err().kind(), "InvalidCondition");
        assert!(evaluate_condition("< 3").is_err());
        assert!(evaluate_condition("3 <").is_err());
    }
}

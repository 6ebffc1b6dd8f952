//! Variable assignment.

use super::TestAction;
use crate::context::TestContext;
use crate::errors::TestflowError;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

/// Creates or overwrites variables in the current scope.
///
/// Values are assigned in declaration order, so a later value may reference
/// an earlier one. Text values are resolved; structured values are stored
/// as given.
#[derive(Debug, Clone, Default)]
pub struct CreateVariablesAction {
    variables: IndexMap<String, Value>,
}

impl CreateVariablesAction {
    /// Creates an action without variables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an action from a variable map.
    #[must_use]
    pub fn from_map(variables: IndexMap<String, Value>) -> Self {
        Self { variables }
    }

    /// Adds a variable.
    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl TestAction for CreateVariablesAction {
    fn name(&self) -> &str {
        "create-variables"
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        for (name, value) in &self.variables {
            let value = match value {
                Value::String(text) => Value::String(ctx.resolve(text)?),
                other => other.clone(),
            };
            tracing::debug!(variable = %name, "Setting variable");
            ctx.set_variable(name.clone(), value);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_variables_resolve_in_order() {
        let ctx = TestContext::new();
        let action = CreateVariablesAction::new()
            .variable("first", "Ada")
            .variable("greeting", "Hello ${first}")
            .variable("order", json!({"id": "${first}"}))
            .variable("count", 3);

        action.execute(&ctx).await.unwrap();

        assert_eq!(ctx.variable_text("greeting").unwrap(), "Hello Ada");
        assert_eq!(ctx.variable("order").unwrap(), json!({"id": "${first}"}));
        assert_eq!(ctx.variable("count").unwrap(), json!(3));
    }

    #[tokio::test]
    async fn test_unresolvable_value_fails() {
        let ctx = TestContext::new();
        let action = CreateVariablesAction::new().variable("x", "${missing}");

        let err = action.execute(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), "UnresolvableReference");
        assert!(!ctx.has_variable("x"));
    }
}

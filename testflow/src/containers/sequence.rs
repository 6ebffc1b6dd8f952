//! Sequential container.

use super::{run_sequence, ContextScope};
use crate::actions::{ActionRef, TestAction};
use crate::context::TestContext;
use crate::errors::TestflowError;
use async_trait::async_trait;
use std::sync::Arc;

/// Runs children in list order, stopping at the first failure.
#[derive(Debug, Clone)]
pub struct Sequence {
    name: String,
    actions: Vec<ActionRef>,
    scope: ContextScope,
}

impl Sequence {
    /// Creates an empty sequence sharing the enclosing scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "sequential".to_string(),
            actions: Vec::new(),
            scope: ContextScope::Shared,
        }
    }

    /// Sets the action name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the scope policy.
    #[must_use]
    pub fn with_scope(mut self, scope: ContextScope) -> Self {
        self.scope = scope;
        self
    }

    /// Appends a child action.
    #[must_use]
    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    /// Appends shared child actions.
    #[must_use]
    pub fn actions(mut self, actions: impl IntoIterator<Item = ActionRef>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Returns the number of children.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if the sequence has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestAction for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        let scope = ctx.derive(self.scope.is_isolated());
        run_sequence(&self.actions, &scope).await
    }
}

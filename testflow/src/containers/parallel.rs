//! Parallel container.

use super::ContextScope;
use crate::actions::{run_action, ActionRef, TestAction};
use crate::context::TestContext;
use crate::errors::{BranchFailure, TestflowError};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::sync::Arc;
use tracing::debug;

/// Runs every child on its own task and waits for all of them.
///
/// A failing branch never cancels its siblings. Once every branch has
/// finished, all failures are reported together, ordered by branch index.
///
/// Branches are isolated by default; sharing the enclosing store across
/// branches is opt-in through [`Parallel::with_scope`] and exposes them to
/// each other's writes while they run.
#[derive(Debug, Clone)]
pub struct Parallel {
    name: String,
    actions: Vec<ActionRef>,
    scope: ContextScope,
}

impl Parallel {
    /// Creates an empty parallel container with isolated branches.
    #[must_use]
    pub fn new() -> Self {
        Self {
            name: "parallel".to_string(),
            actions: Vec::new(),
            scope: ContextScope::Isolated,
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

    /// Appends a branch.
    #[must_use]
    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    /// Appends shared branches.
    #[must_use]
    pub fn actions(mut self, actions: impl IntoIterator<Item = ActionRef>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Returns the number of branches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if there are no branches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for Parallel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TestAction for Parallel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        let total = self.actions.len();
        let mut branches = FuturesUnordered::new();

        for (index, action) in self.actions.iter().enumerate() {
            let action = Arc::clone(action);
            let branch_ctx = ctx.derive(self.scope.is_isolated());
            let handle =
                tokio::spawn(async move { run_action(action.as_ref(), &branch_ctx).await });
            branches.push(handle.map(move |joined| (index, joined)));
        }

        let mut failures = Vec::new();
        while let Some((index, joined)) = branches.next().await {
            let error = match joined {
                Ok(Ok(())) => {
                    debug!(branch = index, "Parallel branch finished");
                    continue;
                }
                Ok(Err(err)) => err,
                Err(join_error) => {
                    TestflowError::Internal(format!("branch task failed: {join_error}"))
                }
            };
            failures.push(BranchFailure {
                index,
                action: self.actions[index].name().to_string(),
                error,
            });
        }

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort_by_key(|failure| failure.index);
            Err(TestflowError::ParallelFailure { total, failures })
        }
    }
}

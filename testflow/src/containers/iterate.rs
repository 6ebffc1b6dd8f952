//! Iterating container.

use super::{evaluate_condition, run_sequence, ContextScope};
use crate::actions::{ActionRef, TestAction};
use crate::context::TestContext;
use crate::errors::TestflowError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Default loop index variable.
pub const DEFAULT_INDEX_NAME: &str = "i";

/// Default guard against runaway condition loops.
pub const DEFAULT_MAX_ITERATIONS: u64 = 1000;

/// What ends the loop.
#[derive(Debug, Clone)]
enum Bound {
    Count(u64),
    Condition(String),
}

/// Repeats its children for a fixed count or while a condition holds.
///
/// Before every pass the index variable is bound to the current index. A
/// condition is resolved and evaluated after binding, so it may reference
/// the index either as `${i}` or by its bare name on either side.
#[derive(Debug, Clone)]
pub struct Iterate {
    actions: Vec<ActionRef>,
    bound: Bound,
    index_name: String,
    start: i64,
    step: i64,
    max_iterations: u64,
    scope: ContextScope,
}

impl Iterate {
    /// Creates a loop running `count` passes.
    #[must_use]
    pub fn times(count: u64) -> Self {
        Self::with_bound(Bound::Count(count))
    }

    /// Creates a loop running while `condition` holds.
    #[must_use]
    pub fn while_condition(condition: impl Into<String>) -> Self {
        Self::with_bound(Bound::Condition(condition.into()))
    }

    fn with_bound(bound: Bound) -> Self {
        Self {
            actions: Vec::new(),
            bound,
            index_name: DEFAULT_INDEX_NAME.to_string(),
            start: 1,
            step: 1,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            scope: ContextScope::Shared,
        }
    }

    /// Sets the index variable name.
    #[must_use]
    pub fn with_index(mut self, name: impl Into<String>) -> Self {
        self.index_name = name.into();
        self
    }

    /// Sets the first index value.
    #[must_use]
    pub fn with_start(mut self, start: i64) -> Self {
        self.start = start;
        self
    }

    /// Sets the index increment.
    #[must_use]
    pub fn with_step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    /// Sets the iteration guard for condition loops.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
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

    fn condition_holds(
        &self,
        condition: &str,
        index: i64,
        ctx: &TestContext,
    ) -> Result<bool, TestflowError> {
        let resolved = ctx.resolve(condition)?;
        let substituted = substitute_word(&resolved, &self.index_name, &index.to_string());
        evaluate_condition(&substituted)
    }
}

/// Replaces every whole-word occurrence of `word` in `text`.
///
/// A word is a maximal run of alphanumerics and underscores, so `i<=3`
/// matches `i` while `limit` or `i_max` do not.
fn substitute_word(text: &str, word: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(is_word_char) {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        let end = tail.find(|c: char| !is_word_char(c)).unwrap_or(tail.len());
        let token = &tail[..end];
        out.push_str(if token == word { replacement } else { token });
        rest = &tail[end..];
    }

    out.push_str(rest);
    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[async_trait]
impl TestAction for Iterate {
    fn name(&self) -> &str {
        "iterate"
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        let scope = ctx.derive(self.scope.is_isolated());
        let mut index = self.start;
        let mut passes: u64 = 0;

        loop {
            scope.set_variable(self.index_name.clone(), index);

            let proceed = match self.bound {
                Bound::Count(count) => passes < count,
                Bound::Condition(ref condition) => {
                    let holds = self.condition_holds(condition, index, &scope)?;
                    if holds && passes >= self.max_iterations {
                        return Err(TestflowError::IterationLimit {
                            limit: self.max_iterations,
                        });
                    }
                    holds
                }
            };
            if !proceed {
                break;
            }

            debug!(index, "Iteration pass");
            run_sequence(&self.actions, &scope).await?;
            passes += 1;
            index += self.step;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{CreateVariablesAction, FailAction};
    use crate::testing::RecordingAction;

    #[tokio::test]
    async fn test_count_loop_binds_index() {
        let recorder = RecordingAction::new("recorder").capturing("i");
        Iterate::times(3)
            .action(recorder.clone())
            .execute(&TestContext::new())
            .await
            .unwrap();
        assert_eq!(recorder.captured(), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_condition_loop_with_bare_index() {
        let recorder = RecordingAction::new("recorder").capturing("n");
        Iterate::while_condition("n <= 6")
            .with_index("n")
            .with_start(2)
            .with_step(2)
            .action(recorder.clone())
            .execute(&TestContext::new())
            .await
            .unwrap();
        assert_eq!(recorder.captured(), vec!["2", "4", "6"]);
    }

    #[tokio::test]
    async fn test_condition_with_unspaced_operator() {
        let recorder = RecordingAction::new("recorder").capturing("i");
        Iterate::while_condition("i<=3")
            .action(recorder.clone())
            .execute(&TestContext::new())
            .await
            .unwrap();
        assert_eq!(recorder.executions(), 3);
        assert_eq!(recorder.captured(), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_condition_mixing_bare_index_and_variable() {
        let ctx = TestContext::new();
        ctx.set_variable("limit", 2);
        let recorder = RecordingAction::new("recorder");

        Iterate::while_condition("i<${limit}")
            .action(recorder.clone())
            .execute(&ctx)
            .await
            .unwrap();
        assert_eq!(recorder.executions(), 1);
    }

    #[test]
    fn test_substitute_word_matches_whole_words_only() {
        assert_eq!(substitute_word("i<=3", "i", "7"), "7<=3");
        assert_eq!(substitute_word("i_max > i", "i", "2"), "i_max > 2");
        assert_eq!(substitute_word("limit!=i", "i", "4"), "limit!=4");
        assert_eq!(substitute_word("", "i", "1"), "");
    }

    #[tokio::test]
    async fn test_condition_reevaluated_against_variables() {
        let ctx = TestContext::new();
        ctx.set_variable("limit", 2);
        let recorder = RecordingAction::new("recorder").capturing("i");

        Iterate::while_condition("${i} <= ${limit}")
            .action(recorder.clone())
            .execute(&ctx)
            .await
            .unwrap();
        assert_eq!(recorder.executions(), 2);
    }

    #[tokio::test]
    async fn test_condition_false_from_start_runs_nothing() {
        let recorder = RecordingAction::new("recorder");
        Iterate::while_condition("i > 10")
            .action(recorder.clone())
            .execute(&TestContext::new())
            .await
            .unwrap();
        assert_eq!(recorder.executions(), 0);
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let err = Iterate::while_condition("true")
            .with_max_iterations(5)
            .action(CreateVariablesAction::new().variable("x", "1"))
            .execute(&TestContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "IterationLimit");
    }

    #[tokio::test]
    async fn test_failure_stops_loop() {
        let recorder = RecordingAction::new("recorder");
        let err = Iterate::times(5)
            .action(recorder.clone())
            .action(FailAction::new("stop at ${i}"))
            .execute(&TestContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "stop at 1");
        assert_eq!(recorder.executions(), 1);
    }

    #[tokio::test]
    async fn test_shared_loop_leaves_index_in_parent() {
        let ctx = TestContext::new();
        Iterate::times(2).execute(&ctx).await.unwrap();
        assert_eq!(ctx.variable_text("i").unwrap(), "3");
    }
}

//! Containers composing child actions.
//!
//! This module provides:
//! - [`Sequence`]: children in order, aborting on the first failure
//! - [`Parallel`]: children on their own tasks, collecting every failure
//! - [`Iterate`]: children repeated for a count or while a condition holds

mod condition;
mod iterate;
mod parallel;
mod sequence;

pub use condition::evaluate_condition;
pub use iterate::{Iterate, DEFAULT_INDEX_NAME, DEFAULT_MAX_ITERATIONS};
pub use parallel::Parallel;
pub use sequence::Sequence;

use crate::actions::{run_action, ActionRef};
use crate::context::TestContext;
use crate::errors::TestflowError;
use serde::{Deserialize, Serialize};

/// How a container derives the context its children run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextScope {
    /// Children share the enclosing store; writes are visible both ways.
    Shared,
    /// Children get a snapshot copy; writes stay local.
    Isolated,
}

impl ContextScope {
    /// Returns true for [`ContextScope::Isolated`].
    #[must_use]
    pub fn is_isolated(self) -> bool {
        matches!(self, Self::Isolated)
    }
}

/// Runs actions one after another against the same context.
///
/// # Errors
///
/// Returns the first failure; later actions do not run.
pub async fn run_sequence(actions: &[ActionRef], ctx: &TestContext) -> Result<(), TestflowError> {
    for action in actions {
        run_action(action.as_ref(), ctx).await?;
    }
    Ok(())
}

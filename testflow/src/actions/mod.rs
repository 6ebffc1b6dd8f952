//! Test actions.
//!
//! Actions are the units of execution of a test. Every action, including
//! containers and template calls, runs against a [`TestContext`] and either
//! succeeds or fails with a [`TestflowError`].

mod control;
mod messaging;
mod template;
mod variables;

pub use control::{AssertFailureAction, EchoAction, FailAction, SleepAction};
pub use messaging::{ReceiveAction, SendAction};
pub use template::CallTemplateAction;
pub use variables::CreateVariablesAction;

use crate::context::TestContext;
use crate::errors::TestflowError;
use crate::events::TestEvent;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

/// Trait for test actions.
#[async_trait]
pub trait TestAction: Send + Sync + Debug {
    /// Returns the name of the action.
    fn name(&self) -> &str;

    /// Executes the action.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The context of the enclosing scope
    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError>;
}

/// Shared handle to an action.
pub type ActionRef = Arc<dyn TestAction>;

/// Runs an action, emitting lifecycle events around it.
///
/// # Errors
///
/// Returns the action's error unchanged.
pub async fn run_action(action: &dyn TestAction, ctx: &TestContext) -> Result<(), TestflowError> {
    let name = action.name();
    ctx.emit(TestEvent::action_started(name));
    let start = Instant::now();

    let result = action.execute(ctx).await;
    let duration_ms = crate::utils::duration_ms(start.elapsed());

    match result {
        Ok(()) => {
            ctx.emit(TestEvent::action_succeeded(name, duration_ms));
            Ok(())
        }
        Err(err) => {
            tracing::debug!(action = name, error = %err, "Action failed");
            ctx.emit(TestEvent::action_failed(name, &err.to_string(), duration_ms));
            Err(err)
        }
    }
}

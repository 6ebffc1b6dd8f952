//! Echo, sleep and failure control actions.

use super::{run_action, ActionRef, TestAction};
use crate::context::TestContext;
use crate::errors::TestflowError;
use crate::events::TestEvent;
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

/// Logs a resolved message and emits it as an `echo` event.
#[derive(Debug, Clone)]
pub struct EchoAction {
    message: String,
}

impl EchoAction {
    /// Creates a new echo action.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl TestAction for EchoAction {
    fn name(&self) -> &str {
        "echo"
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        let message = ctx.resolve(&self.message)?;
        info!("{message}");
        ctx.emit(TestEvent::echo(&message));
        Ok(())
    }
}

/// Suspends the current branch.
///
/// The delay is given in milliseconds and may be a dynamic value such as
/// `${delay}`.
#[derive(Debug, Clone)]
pub struct SleepAction {
    milliseconds: String,
}

impl SleepAction {
    /// Creates a sleep of fixed length.
    #[must_use]
    pub fn new(duration: Duration) -> Self {
        Self {
            milliseconds: duration.as_millis().to_string(),
        }
    }

    /// Creates a sleep whose length in milliseconds is resolved at runtime.
    #[must_use]
    pub fn from_expression(milliseconds: impl Into<String>) -> Self {
        Self {
            milliseconds: milliseconds.into(),
        }
    }
}

#[async_trait]
impl TestAction for SleepAction {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        let resolved = ctx.resolve(&self.milliseconds)?;
        let milliseconds: u64 = resolved.trim().parse().map_err(|_| {
            TestflowError::validation(format!("sleep time '{resolved}' is not a number of milliseconds"))
        })?;

        info!(milliseconds, "Sleeping");
        tokio::time::sleep(Duration::from_millis(milliseconds)).await;
        Ok(())
    }
}

/// Fails the test with a resolved message.
#[derive(Debug, Clone)]
pub struct FailAction {
    message: String,
}

impl FailAction {
    /// Creates a new fail action.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl TestAction for FailAction {
    fn name(&self) -> &str {
        "fail"
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        let message = ctx.resolve(&self.message)?;
        Err(TestflowError::ActionFailed { message })
    }
}

/// Succeeds only if the wrapped action fails.
#[derive(Debug, Clone)]
pub struct AssertFailureAction {
    action: ActionRef,
    expected_message: Option<String>,
}

impl AssertFailureAction {
    /// Wraps an action that is expected to fail.
    #[must_use]
    pub fn new(action: ActionRef) -> Self {
        Self {
            action,
            expected_message: None,
        }
    }

    /// Also checks the failure message against an expected value or matcher.
    #[must_use]
    pub fn with_message(mut self, expected: impl Into<String>) -> Self {
        self.expected_message = Some(expected.into());
        self
    }
}

#[async_trait]
impl TestAction for AssertFailureAction {
    fn name(&self) -> &str {
        "assert-failure"
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        match run_action(self.action.as_ref(), ctx).await {
            Ok(()) => Err(TestflowError::ExpectedFailure {
                action: self.action.name().to_string(),
            }),
            Err(err) => {
                info!(action = self.action.name(), error = %err, "Caught expected failure");
                match self.expected_message {
                    Some(ref expected) => ctx.validate("error", expected, &err.to_string()),
                    None => Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CollectingEventSink;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_echo_resolves_and_emits() {
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = TestContext::new().with_event_sink(sink.clone());
        ctx.set_variable("who", "world");

        EchoAction::new("hello ${who}").execute(&ctx).await.unwrap();
        assert_eq!(sink.echoed(), vec!["hello world"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_uses_resolved_delay() {
        let ctx = TestContext::new();
        ctx.set_variable("delay", 250);

        let start = tokio::time::Instant::now();
        SleepAction::from_expression("${delay}").execute(&ctx).await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_sleep_rejects_non_numeric_delay() {
        let err = SleepAction::from_expression("soon")
            .execute(&TestContext::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[tokio::test]
    async fn test_fail_resolves_message() {
        let ctx = TestContext::new();
        ctx.set_variable("id", 7);
        let err = FailAction::new("order ${id} rejected").execute(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "order 7 rejected");
    }

    #[tokio::test]
    async fn test_assert_failure() {
        let ctx = TestContext::new();

        let caught = AssertFailureAction::new(Arc::new(FailAction::new("expected boom")))
            .with_message("@contains('boom')@");
        assert!(caught.execute(&ctx).await.is_ok());

        let wrong_message = AssertFailureAction::new(Arc::new(FailAction::new("other")))
            .with_message("@contains('boom')@");
        assert!(wrong_message.execute(&ctx).await.is_err());

        let succeeded = AssertFailureAction::new(Arc::new(EchoAction::new("fine")));
        let err = succeeded.execute(&ctx).await.unwrap_err();
        assert_eq!(err.kind(), "ExpectedFailure");
    }
}

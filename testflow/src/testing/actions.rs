//! Recording actions for container tests.

use crate::actions::TestAction;
use crate::context::TestContext;
use crate::errors::TestflowError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Recording {
    executions: usize,
    captured: Vec<String>,
}

/// An action that counts its executions and optionally captures a variable.
///
/// Clones share their recording, so a clone can be handed to a container
/// while the original is inspected afterwards.
#[derive(Debug, Clone)]
pub struct RecordingAction {
    name: String,
    capture: Option<String>,
    delay: Option<Duration>,
    recording: Arc<Mutex<Recording>>,
}

impl RecordingAction {
    /// Creates a new recording action.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capture: None,
            delay: None,
            recording: Arc::new(Mutex::new(Recording::default())),
        }
    }

    /// Captures the text of a variable on every execution.
    #[must_use]
    pub fn capturing(mut self, variable: impl Into<String>) -> Self {
        self.capture = Some(variable.into());
        self
    }

    /// Sleeps before recording.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of executions.
    #[must_use]
    pub fn executions(&self) -> usize {
        self.recording.lock().executions
    }

    /// Returns the captured values in execution order.
    #[must_use]
    pub fn captured(&self) -> Vec<String> {
        self.recording.lock().captured.clone()
    }
}

#[async_trait]
impl TestAction for RecordingAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let captured = match self.capture {
            Some(ref variable) => Some(ctx.variable_text(variable)?),
            None => None,
        };

        let mut recording = self.recording.lock();
        recording.executions += 1;
        recording.captured.extend(captured);
        Ok(())
    }
}

//! Send and receive actions.

use super::TestAction;
use crate::context::TestContext;
use crate::endpoints::Endpoint;
use crate::errors::TestflowError;
use crate::message::Message;
use crate::validation::{JsonMessageValidator, MessageExpectation, MessageValidator};
use crate::variables::value_as_text;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Sends a message through an endpoint.
///
/// Payload and header values are resolved in the current scope before the
/// message is built.
#[derive(Debug, Clone)]
pub struct SendAction {
    endpoint: Arc<Endpoint>,
    payload: Value,
    headers: IndexMap<String, Value>,
    message_id: Option<String>,
}

impl SendAction {
    /// Creates a new send action.
    #[must_use]
    pub fn new(endpoint: Arc<Endpoint>, payload: impl Into<Value>) -> Self {
        Self {
            endpoint,
            payload: payload.into(),
            headers: IndexMap::new(),
            message_id: None,
        }
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the message id; may be a dynamic value.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    fn build_message(&self, ctx: &TestContext) -> Result<Message, TestflowError> {
        let mut message = Message::new(ctx.resolve_value(&self.payload)?);
        if let Some(ref id) = self.message_id {
            message = message.with_id(ctx.resolve(id)?);
        }
        for (name, value) in &self.headers {
            message = message.with_header(name.clone(), ctx.resolve_value(value)?);
        }
        Ok(message)
    }
}

#[async_trait]
impl TestAction for SendAction {
    fn name(&self) -> &str {
        "send"
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        let message = self.build_message(ctx)?;
        self.endpoint.send(message, ctx).await
    }
}

/// Receives a correlated reply, validates it and extracts variables.
#[derive(Clone)]
pub struct ReceiveAction {
    endpoint: Arc<Endpoint>,
    expectation: MessageExpectation,
    validator: Arc<dyn MessageValidator>,
    timeout: Option<Duration>,
    selector: Option<String>,
    header_extracts: IndexMap<String, String>,
    payload_extracts: IndexMap<String, String>,
}

impl ReceiveAction {
    /// Creates a receive for the reply to the last send in scope.
    #[must_use]
    pub fn new(endpoint: Arc<Endpoint>) -> Self {
        Self {
            endpoint,
            expectation: MessageExpectation::default(),
            validator: Arc::new(JsonMessageValidator::new()),
            timeout: None,
            selector: None,
            header_extracts: IndexMap::new(),
            payload_extracts: IndexMap::new(),
        }
    }

    /// Sets the expected payload.
    #[must_use]
    pub fn expect_payload(mut self, payload: impl Into<Value>) -> Self {
        self.expectation.payload = Some(payload.into());
        self
    }

    /// Adds an expected header value or matcher.
    #[must_use]
    pub fn expect_header(mut self, name: impl Into<String>, expected: impl Into<String>) -> Self {
        self.expectation.headers.insert(name.into(), expected.into());
        self
    }

    /// Replaces the whole expectation.
    #[must_use]
    pub fn with_expectation(mut self, expectation: MessageExpectation) -> Self {
        self.expectation = expectation;
        self
    }

    /// Sets the message validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn MessageValidator>) -> Self {
        self.validator = validator;
        self
    }

    /// Overrides the endpoint timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Receives the reply stored under an explicit key; may be a dynamic value.
    #[must_use]
    pub fn with_selector(mut self, key: impl Into<String>) -> Self {
        self.selector = Some(key.into());
        self
    }

    /// Stores a header of the reply in a variable.
    #[must_use]
    pub fn extract_header(mut self, header: impl Into<String>, variable: impl Into<String>) -> Self {
        self.header_extracts.insert(header.into(), variable.into());
        self
    }

    /// Stores the payload value at a JSON pointer (e.g. `/order/id`) in a
    /// variable. The empty pointer selects the whole payload.
    #[must_use]
    pub fn extract_payload(mut self, pointer: impl Into<String>, variable: impl Into<String>) -> Self {
        self.payload_extracts.insert(pointer.into(), variable.into());
        self
    }

    fn extract(&self, message: &Message, ctx: &TestContext) -> Result<(), TestflowError> {
        for (header, variable) in &self.header_extracts {
            let value = message.header(header).ok_or_else(|| {
                TestflowError::validation(format!("cannot extract missing header '{header}'"))
            })?;
            ctx.set_variable(variable.clone(), value_as_text(value));
        }

        for (pointer, variable) in &self.payload_extracts {
            let value = message.payload.pointer(pointer).ok_or_else(|| {
                TestflowError::validation(format!("cannot extract missing payload element '{pointer}'"))
            })?;
            ctx.set_variable(variable.clone(), value.clone());
        }

        Ok(())
    }
}

#[async_trait]
impl TestAction for ReceiveAction {
    fn name(&self) -> &str {
        "receive"
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        let message = match self.selector {
            Some(ref selector) => {
                let key = ctx.resolve(selector)?;
                self.endpoint.receive_selected(&key, ctx, self.timeout).await?
            }
            None => self.endpoint.receive(ctx, self.timeout).await?,
        };

        if !self.expectation.is_empty() {
            self.validator.validate(&self.expectation, &message, ctx)?;
        }

        self.extract(&message, ctx)
    }
}

impl fmt::Debug for ReceiveAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiveAction")
            .field("endpoint", &self.endpoint.name())
            .field("expectation", &self.expectation)
            .field("timeout", &self.timeout)
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}

//! Operation dispatch for inbound request/response endpoints.
//!
//! Each inbound request names its operation in the `operation` header; the
//! dispatcher looks the name up in an explicit table and answers with the
//! handler's result, correlated to the request.

use super::Transport;
use crate::errors::TestflowError;
use crate::message::{Message, OPERATION_HEADER};
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// An operation handler receiving the request and producing the reply payload.
pub type OperationHandler =
    Arc<dyn Fn(Message) -> BoxFuture<'static, Result<Value, TestflowError>> + Send + Sync>;

/// Maps operation names to handlers.
#[derive(Clone, Default)]
pub struct OperationDispatcher {
    operations: HashMap<String, OperationHandler>,
}

impl OperationDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation handler.
    pub fn register<F, Fut>(&mut self, operation: impl Into<String>, handler: F)
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TestflowError>> + Send + 'static,
    {
        self.operations
            .insert(operation.into(), Arc::new(move |message| handler(message).boxed()));
    }

    /// Registers an operation handler and returns the dispatcher.
    #[must_use]
    pub fn with_operation<F, Fut>(mut self, operation: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TestflowError>> + Send + 'static,
    {
        self.register(operation, handler);
        self
    }

    /// Returns the registered operation names, sorted.
    #[must_use]
    pub fn operations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.operations.keys().cloned().collect();
        names.sort();
        names
    }

    /// Invokes the operation named by the request.
    ///
    /// # Errors
    ///
    /// Returns `UnknownOperation` if the request names no registered
    /// operation, or the handler's error.
    pub async fn invoke(&self, request: &Message) -> Result<Message, TestflowError> {
        let operation = request.header_text(OPERATION_HEADER).unwrap_or_default();
        let handler = self
            .operations
            .get(&operation)
            .ok_or_else(|| TestflowError::UnknownOperation {
                operation: operation.clone(),
            })?;

        debug!(operation = %operation, request_id = %request.id, "Invoking operation");
        let result = handler(request.clone()).await?;
        Ok(request
            .reply(result)
            .with_header(OPERATION_HEADER, operation))
    }
}

#[async_trait]
impl Transport for OperationDispatcher {
    async fn dispatch(
        &self,
        _endpoint: &str,
        message: &Message,
    ) -> Result<Option<Message>, TestflowError> {
        self.invoke(message).await.map(Some)
    }
}

impl fmt::Debug for OperationDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationDispatcher")
            .field("operations", &self.operations())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dispatcher() -> OperationDispatcher {
        OperationDispatcher::new()
            .with_operation("hello", |request: Message| async move {
                Ok::<_, TestflowError>(json!(format!("Hello {}", request.payload_text())))
            })
            .with_operation("sum", |request: Message| async move {
                let total: i64 = request
                    .payload
                    .as_array()
                    .map(|items| items.iter().filter_map(Value::as_i64).sum())
                    .unwrap_or_default();
                Ok::<_, TestflowError>(json!(total))
            })
    }

    #[tokio::test]
    async fn test_dispatches_by_operation_header() {
        let request = Message::new(json!([1, 2, 3])).with_header(OPERATION_HEADER, "sum");
        let reply = dispatcher().invoke(&request).await.unwrap();

        assert_eq!(reply.payload, json!(6));
        assert_eq!(reply.correlation_id(), Some(request.id.clone()));
        assert_eq!(reply.header_text(OPERATION_HEADER), Some("sum".to_string()));
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let request = Message::new("x").with_header(OPERATION_HEADER, "nope");
        let err = dispatcher().invoke(&request).await.unwrap_err();
        assert_eq!(err.kind(), "UnknownOperation");
    }

    #[tokio::test]
    async fn test_acts_as_request_reply_transport() {
        let request = Message::new("Ada").with_header(OPERATION_HEADER, "hello");
        let reply = dispatcher().dispatch("greeter", &request).await.unwrap();
        assert_eq!(reply.unwrap().payload_text(), "Hello Ada");
    }

    #[test]
    fn test_operations_are_listed() {
        assert_eq!(dispatcher().operations(), vec!["hello", "sum"]);
    }
}

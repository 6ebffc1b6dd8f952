//! In-memory transports.

use crate::endpoints::Transport;
use crate::errors::TestflowError;
use crate::message::Message;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Request/reply transport answering every message with a copy of its
/// payload and headers, correlated to the request.
#[derive(Debug, Clone, Default)]
pub struct EchoTransport {
    latency: Option<Duration>,
}

impl EchoTransport {
    /// Creates a new echo transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every reply.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }
}

#[async_trait]
impl Transport for EchoTransport {
    async fn dispatch(
        &self,
        _endpoint: &str,
        message: &Message,
    ) -> Result<Option<Message>, TestflowError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut reply = message.reply(message.payload.clone());
        for (name, value) in &message.headers {
            reply.headers.entry(name.clone()).or_insert_with(|| value.clone());
        }
        Ok(Some(reply))
    }
}

/// Fire-and-forget transport recording every dispatched message.
///
/// Replies are delivered by the test itself through
/// [`Endpoint::on_message`](crate::endpoints::Endpoint::on_message).
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<Message>>>,
}

impl RecordingTransport {
    /// Creates a new recording transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the dispatched messages.
    #[must_use]
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().clone()
    }

    /// Returns the last dispatched message.
    #[must_use]
    pub fn last(&self) -> Option<Message> {
        self.sent.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn dispatch(
        &self,
        _endpoint: &str,
        message: &Message,
    ) -> Result<Option<Message>, TestflowError> {
        self.sent.lock().push(message.clone());
        Ok(None)
    }
}

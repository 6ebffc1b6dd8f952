//! Endpoint pairing synchronous sends with their receives.

use super::{Correlator, MessageIdCorrelator, Transport};
use crate::context::TestContext;
use crate::correlation::{
    CorrelationManager, PollingCorrelationManager, DEFAULT_POLLING_INTERVAL, DEFAULT_RETENTION,
};
use crate::errors::TestflowError;
use crate::events::TestEvent;
use crate::message::Message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default time a receive waits for a reply.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Per-endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Receive timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Interval between correlation lookups in milliseconds.
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    /// How long a timed-out key waits for a late reply, in milliseconds.
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,

    /// Variable receiving the id of every sent message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id_variable: Option<String>,
}

#[allow(clippy::cast_possible_truncation)]
fn default_timeout_ms() -> u64 {
    DEFAULT_RECEIVE_TIMEOUT.as_millis() as u64
}

#[allow(clippy::cast_possible_truncation)]
fn default_polling_interval_ms() -> u64 {
    DEFAULT_POLLING_INTERVAL.as_millis() as u64
}

#[allow(clippy::cast_possible_truncation)]
fn default_retention_ms() -> u64 {
    DEFAULT_RETENTION.as_millis() as u64
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            polling_interval_ms: default_polling_interval_ms(),
            retention_ms: default_retention_ms(),
            message_id_variable: None,
        }
    }
}

impl EndpointConfig {
    /// Creates a new config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the receive timeout.
    #[must_use]
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the polling interval.
    #[must_use]
    pub fn with_polling_interval_ms(mut self, interval_ms: u64) -> Self {
        self.polling_interval_ms = interval_ms;
        self
    }

    /// Sets the late reply retention.
    #[must_use]
    pub fn with_retention_ms(mut self, retention_ms: u64) -> Self {
        self.retention_ms = retention_ms;
        self
    }

    /// Stores the id of every sent message in the named variable.
    #[must_use]
    pub fn with_message_id_variable(mut self, name: impl Into<String>) -> Self {
        self.message_id_variable = Some(name.into());
        self
    }

    /// Returns the receive timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the polling interval is zero.
    pub fn validate(&self) -> Result<(), TestflowError> {
        if self.polling_interval_ms == 0 {
            return Err(TestflowError::Configuration(
                "endpoint polling_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// A named endpoint.
///
/// The endpoint owns its correlation manager, so managers outlive the
/// contexts that create keys in them.
pub struct Endpoint {
    name: String,
    transport: Arc<dyn Transport>,
    correlator: Arc<dyn Correlator>,
    correlation: Arc<dyn CorrelationManager>,
    config: EndpointConfig,
}

impl Endpoint {
    /// Creates an endpoint with message id correlation and default settings.
    #[must_use]
    pub fn new(name: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self::with_config(name, transport, EndpointConfig::default())
    }

    /// Creates an endpoint with the given settings.
    ///
    /// A zero polling interval is raised to the manager's minimum; call
    /// [`EndpointConfig::validate`] first to reject it instead.
    #[must_use]
    pub fn with_config(
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: EndpointConfig,
    ) -> Self {
        let correlation = PollingCorrelationManager::new()
            .with_polling_interval(Duration::from_millis(config.polling_interval_ms))
            .with_retention(Duration::from_millis(config.retention_ms));

        Self {
            name: name.into(),
            transport,
            correlator: Arc::new(MessageIdCorrelator),
            correlation: Arc::new(correlation),
            config,
        }
    }

    /// Sets the correlator.
    #[must_use]
    pub fn with_correlator(mut self, correlator: Arc<dyn Correlator>) -> Self {
        self.correlator = correlator;
        self
    }

    /// Sets the correlation manager.
    #[must_use]
    pub fn with_correlation_manager(mut self, manager: Arc<dyn CorrelationManager>) -> Self {
        self.correlation = manager;
        self
    }

    /// Returns the endpoint name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the endpoint settings.
    #[must_use]
    pub fn config(&self) -> &EndpointConfig {
        &self.config
    }

    /// Returns the context variable name holding this endpoint's key.
    #[must_use]
    pub fn key_name(&self) -> String {
        self.correlator.key_name(&self.name)
    }

    /// Returns the correlation manager.
    #[must_use]
    pub fn correlation_manager(&self) -> &Arc<dyn CorrelationManager> {
        &self.correlation
    }

    /// Sends a message.
    ///
    /// The correlation key is registered before dispatch, so a reply that
    /// arrives while the transport is still busy is never lost. A reply
    /// returned by the transport is stored under the same key.
    ///
    /// # Errors
    ///
    /// Returns `CorrelationKeyMissing` if no key can be computed for the
    /// message, or the transport's error. A failed dispatch discards the
    /// key it registered.
    pub async fn send(&self, message: Message, ctx: &TestContext) -> Result<(), TestflowError> {
        let key_name = self.key_name();
        let key = self
            .correlator
            .extract_key(&message)
            .ok_or_else(|| TestflowError::CorrelationKeyMissing {
                key_name: key_name.clone(),
            })?;

        self.correlation.create_key(&key_name, &key, ctx);
        if let Some(ref variable) = self.config.message_id_variable {
            ctx.set_variable(variable.clone(), message.id.clone());
        }

        info!(endpoint = %self.name, message_id = %message.id, "Sending message");
        debug!(endpoint = %self.name, payload = %message.payload_text(), "Message payload");

        let dispatched = match self.transport.dispatch(&self.name, &message).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!(endpoint = %self.name, key = %key, error = %err, "Dispatch failed");
                self.correlation.discard(&key);
                return Err(err);
            }
        };

        if let Some(reply) = dispatched {
            info!(endpoint = %self.name, key = %key, "Received synchronous reply");
            self.correlation.store(&key, reply);
        }

        Ok(())
    }

    /// Accepts a reply delivered asynchronously by the transport.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the reply carries no correlation key.
    pub fn on_message(&self, reply: Message) -> Result<(), TestflowError> {
        let key = self.correlator.reply_key(&reply).ok_or_else(|| {
            TestflowError::validation(format!(
                "reply {} on endpoint '{}' carries no correlation key",
                reply.id, self.name
            ))
        })?;

        debug!(endpoint = %self.name, key = %key, "Reply arrived");
        self.correlation.store(&key, reply);
        Ok(())
    }

    /// Receives the reply to the last message sent in this context's scope.
    ///
    /// # Errors
    ///
    /// Returns `CorrelationKeyMissing` if nothing was sent in scope, or
    /// `ActionTimeout` if no reply arrives in time.
    pub async fn receive(
        &self,
        ctx: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, TestflowError> {
        let key = self.correlation.correlation_key(&self.key_name(), ctx)?;
        self.receive_selected(&key, ctx, timeout).await
    }

    /// Receives the reply stored under an explicit correlation key.
    ///
    /// # Errors
    ///
    /// Returns `ActionTimeout` if no reply arrives in time.
    pub async fn receive_selected(
        &self,
        key: &str,
        ctx: &TestContext,
        timeout: Option<Duration>,
    ) -> Result<Message, TestflowError> {
        let timeout = timeout.unwrap_or_else(|| self.config.timeout());

        match self.correlation.find(key, timeout).await {
            Ok(reply) => {
                info!(endpoint = %self.name, message_id = %reply.id, "Received message");
                Ok(reply)
            }
            Err(err) => {
                if err.is_timeout() {
                    ctx.emit(TestEvent::correlation_timeout(&self.key_name(), key));
                }
                Err(err)
            }
        }
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("name", &self.name)
            .field("correlator", &self.correlator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

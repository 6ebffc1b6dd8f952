//! Correlation of asynchronously arriving replies with pending requests.
//!
//! A send registers a correlation key before dispatching; the reply channel
//! later stores the reply under that key and the matching receive claims it.
//! The key itself travels through the test context as a variable named by
//! the endpoint's key name, so a receive in the same scope finds it again.

mod polling;

pub use polling::{PollingCorrelationManager, DEFAULT_POLLING_INTERVAL, DEFAULT_RETENTION};

use crate::context::TestContext;
use crate::errors::TestflowError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// State of a correlation entry.
///
/// Consumed entries are removed from the table, so a consumed key reports no
/// state at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationState {
    /// Registered by a send, no reply yet.
    Created,
    /// A reply is waiting to be claimed.
    Stored,
    /// A retrieval timed out and no reply has arrived since.
    ///
    /// This is the "left as created after a timeout" state: the key is still
    /// registered, so a late reply can be stored and claimed until the
    /// retention window that started at the timeout has passed.
    Expired,
}

/// Registry of correlation keys and the replies stored under them.
#[async_trait]
pub trait CorrelationManager: Send + Sync {
    /// Binds `key_name` to `key_value` in the context and registers a
    /// pending entry. Never overwrites a stored reply.
    fn create_key(&self, key_name: &str, key_value: &str, ctx: &TestContext);

    /// Reads the current key for `key_name` back from the context.
    ///
    /// # Errors
    ///
    /// Returns `CorrelationKeyMissing` if no key is bound.
    fn correlation_key(&self, key_name: &str, ctx: &TestContext) -> Result<String, TestflowError> {
        ctx.variables()
            .get_opt(key_name)
            .map(|value| crate::variables::value_as_text(&value))
            .ok_or_else(|| TestflowError::CorrelationKeyMissing {
                key_name: key_name.to_string(),
            })
    }

    /// Stores a reply under `key_value`.
    fn store(&self, key_value: &str, message: Message);

    /// Waits until a reply is stored under `key_value` and claims it.
    ///
    /// # Errors
    ///
    /// Returns `ActionTimeout` if nothing arrives within `timeout`.
    async fn find(&self, key_value: &str, timeout: Duration) -> Result<Message, TestflowError>;

    /// Claims a stored reply without waiting.
    fn try_find(&self, key_value: &str) -> Option<Message>;

    /// Drops a pending key that will never receive a reply, such as one
    /// registered by a send whose dispatch failed. A stored reply is kept.
    fn discard(&self, _key_value: &str) {}
}

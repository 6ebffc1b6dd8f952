//! Message type exchanged with transports.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::variables::value_as_text;

/// Header carrying the id of the request a reply belongs to.
pub const CORRELATION_ID_HEADER: &str = "correlation_id";

/// Header naming the operation an inbound request targets.
pub const OPERATION_HEADER: &str = "operation";

/// A message sent to or received from an endpoint.
///
/// The engine never inspects the payload format itself; payloads are carried
/// as JSON values and handed to validators and correlators as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message id.
    pub id: String,

    /// Message headers in insertion order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, Value>,

    /// Message payload.
    #[serde(default)]
    pub payload: Value,

    /// When the message was created (ISO 8601).
    pub timestamp: String,
}

impl Message {
    /// Creates a new message with a generated id.
    #[must_use]
    pub fn new(payload: impl Into<Value>) -> Self {
        Self {
            id: crate::utils::generate_uuid().to_string(),
            headers: IndexMap::new(),
            payload: payload.into(),
            timestamp: crate::utils::iso_timestamp(),
        }
    }

    /// Sets the message id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the correlation id header.
    #[must_use]
    pub fn with_correlation_id(self, correlation_id: impl Into<String>) -> Self {
        self.with_header(CORRELATION_ID_HEADER, correlation_id.into())
    }

    /// Gets a header value.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    /// Gets a header value in its text form.
    #[must_use]
    pub fn header_text(&self, name: &str) -> Option<String> {
        self.headers.get(name).map(value_as_text)
    }

    /// Returns the correlation id header, if any.
    #[must_use]
    pub fn correlation_id(&self) -> Option<String> {
        self.header_text(CORRELATION_ID_HEADER)
    }

    /// Returns the payload in its text form.
    #[must_use]
    pub fn payload_text(&self) -> String {
        value_as_text(&self.payload)
    }

    /// Creates a reply to this message, correlated by this message's id.
    #[must_use]
    pub fn reply(&self, payload: impl Into<Value>) -> Self {
        Self::new(payload).with_correlation_id(self.id.clone())
    }
}

//! Correlation key strategies.

use crate::message::{Message, CORRELATION_ID_HEADER};
use std::fmt::Debug;

/// Computes correlation keys for an endpoint.
pub trait Correlator: Send + Sync + Debug {
    /// Returns the context variable name holding the endpoint's current key.
    ///
    /// Names embed the endpoint name so keys of different endpoints never
    /// collide in a shared context.
    fn key_name(&self, endpoint: &str) -> String {
        format!("{endpoint}_correlation_key")
    }

    /// Extracts the correlation key from an outbound request.
    fn extract_key(&self, request: &Message) -> Option<String>;

    /// Extracts the correlation key from an inbound reply.
    fn reply_key(&self, reply: &Message) -> Option<String> {
        reply.correlation_id()
    }
}

/// Correlates by request message id.
///
/// Replies carry the request id in the `correlation_id` header.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageIdCorrelator;

impl Correlator for MessageIdCorrelator {
    fn extract_key(&self, request: &Message) -> Option<String> {
        Some(request.id.clone())
    }
}

/// Correlates by the value of a header present on both request and reply.
#[derive(Debug, Clone)]
pub struct HeaderCorrelator {
    header: String,
}

impl HeaderCorrelator {
    /// Creates a correlator reading the given header.
    #[must_use]
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into(),
        }
    }

    /// Returns the header name.
    #[must_use]
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Default for HeaderCorrelator {
    fn default() -> Self {
        Self::new(CORRELATION_ID_HEADER)
    }
}

impl Correlator for HeaderCorrelator {
    fn extract_key(&self, request: &Message) -> Option<String> {
        request.header_text(&self.header)
    }

    fn reply_key(&self, reply: &Message) -> Option<String> {
        reply.header_text(&self.header)
    }
}

//! The transport seam.

use crate::errors::TestflowError;
use crate::message::Message;
use async_trait::async_trait;

/// A message channel an endpoint dispatches through.
///
/// Request/reply transports return the reply from `dispatch`; the endpoint
/// stores it under the request's correlation key. Fire-and-forget transports
/// return `None` and deliver replies later through
/// [`Endpoint::on_message`](super::Endpoint::on_message).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatches a message on behalf of the named endpoint.
    async fn dispatch(
        &self,
        endpoint: &str,
        message: &Message,
    ) -> Result<Option<Message>, TestflowError>;
}

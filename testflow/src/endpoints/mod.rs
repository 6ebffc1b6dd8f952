//! Endpoints binding transports to the correlation engine.
//!
//! This module provides:
//! - The [`Transport`] seam implemented by concrete message channels
//! - [`Correlator`] strategies computing correlation keys
//! - [`Endpoint`], which pairs a synchronous send with its receive
//! - [`OperationDispatcher`] for inbound request/response endpoints

mod correlator;
mod dispatcher;
mod endpoint;
mod registry;
mod transport;

pub use correlator::{Correlator, HeaderCorrelator, MessageIdCorrelator};
pub use dispatcher::{OperationDispatcher, OperationHandler};
pub use endpoint::{Endpoint, EndpointConfig};
pub use registry::EndpointRegistry;
pub use transport::Transport;

#[cfg(test)]
pub(crate) use transport::MockTransport;

//! # Testflow
//!
//! A declarative execution engine for integration tests against messaging and
//! service endpoints.
//!
//! Testflow runs ordered and parallel sequences of test actions with support for:
//!
//! - **Variable scoping**: a shared or isolated variable store per branch and template call
//! - **Dynamic values**: `${variable}` references and `core:function(...)` calls resolved at runtime
//! - **Reply correlation**: synchronous-looking send/receive pairs over asynchronous reply channels
//! - **Composition**: sequential, parallel and iterating containers plus reusable templates
//! - **Event-driven observability**: action lifecycle events for external reporting
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use testflow::prelude::*;
//!
//! let runner = TestRunner::new(EngineConfig::default());
//! let endpoint = runner.create_endpoint("orders", Arc::new(EchoTransport::new()));
//!
//! let test = TestCase::new("order-roundtrip")
//!     .with_variable("orderId", "4711")
//!     .action(SendAction::new(endpoint.clone(), json!({"order": "${orderId}"})))
//!     .action(ReceiveAction::new(endpoint).expect_payload(json!({"order": "4711"})));
//!
//! let result = runner.run(&test).await;
//! assert!(result.success);
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod actions;
pub mod builder;
pub mod config;
pub mod containers;
pub mod context;
pub mod correlation;
pub mod endpoints;
pub mod errors;
pub mod events;
pub mod message;
pub mod observability;
pub mod runner;
pub mod templates;
pub mod testing;
pub mod utils;
pub mod validation;
pub mod variables;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::actions::{
        run_action, ActionRef, AssertFailureAction, CallTemplateAction, CreateVariablesAction,
        EchoAction, FailAction, ReceiveAction, SendAction, SleepAction, TestAction,
    };
    pub use crate::builder::{ActionSpec, TemplateSpec, TestCaseSpec};
    pub use crate::config::{EngineConfig, LoggingConfig};
    pub use crate::containers::{ContextScope, Iterate, Parallel, Sequence};
    pub use crate::context::TestContext;
    pub use crate::correlation::{CorrelationManager, CorrelationState, PollingCorrelationManager};
    pub use crate::endpoints::{
        Correlator, Endpoint, EndpointConfig, EndpointRegistry, HeaderCorrelator,
        MessageIdCorrelator, OperationDispatcher, Transport,
    };
    pub use crate::errors::{BranchFailure, TestflowError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink, TestEvent};
    pub use crate::message::Message;
    pub use crate::runner::{TestCase, TestResult, TestRunner};
    pub use crate::templates::{Template, TemplateParameter, TemplateRegistry};
    pub use crate::testing::EchoTransport;
    pub use crate::validation::{JsonMessageValidator, MessageExpectation, MessageValidator};
    pub use crate::variables::{FunctionLibrary, ValidationMatcherLibrary, VariableStore};
}

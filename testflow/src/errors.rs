//! Error types for the testflow engine.
//!
//! Every failure raised while resolving variables, correlating replies or
//! running actions is expressed as a [`TestflowError`]. Failures bubble up
//! through the container chain exactly once; nothing in the engine retries
//! implicitly.

use serde_json::json;
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for testflow operations.
#[derive(Debug, Error)]
pub enum TestflowError {
    /// A variable was read that is not defined in the context.
    #[error("Unknown variable '{name}'")]
    UnknownVariable {
        /// The variable name.
        name: String,
    },

    /// A `${...}` reference could not be resolved.
    #[error("Unable to resolve reference '{reference}': {reason}")]
    UnresolvableReference {
        /// The raw reference text.
        reference: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A function call inside a dynamic value failed.
    #[error("Failed to evaluate function '{function}': {reason}")]
    FunctionEvaluation {
        /// The function name.
        function: String,
        /// Resolver provided detail.
        reason: String,
    },

    /// No reply arrived within the configured timeout.
    #[error("Action timeout after {timeout_ms}ms: {message}")]
    ActionTimeout {
        /// Description of what was awaited.
        message: String,
        /// The timeout that elapsed.
        timeout_ms: u64,
    },

    /// A template was invoked that is not registered.
    #[error("Unknown template '{name}'")]
    UnknownTemplate {
        /// The template name.
        name: String,
    },

    /// A template body failed.
    #[error("Template '{template}' failed: {source}")]
    TemplateFailed {
        /// The template name.
        template: String,
        /// The first unrecovered failure of the body.
        #[source]
        source: Box<TestflowError>,
    },

    /// A declared template parameter was neither supplied nor defaulted.
    #[error("Missing parameter '{parameter}' for template '{template}'")]
    MissingTemplateParameter {
        /// The template name.
        template: String,
        /// The parameter name.
        parameter: String,
    },

    /// One or more branches of a parallel container failed.
    #[error("{} of {total} parallel branches failed: {}", .failures.len(), summarize(.failures))]
    ParallelFailure {
        /// Number of branches that ran.
        total: usize,
        /// Every branch failure, ordered by branch index.
        failures: Vec<BranchFailure>,
    },

    /// No correlation key is stored in the context for the key name.
    #[error("Missing correlation key '{key_name}' in test context")]
    CorrelationKeyMissing {
        /// The correlation key name.
        key_name: String,
    },

    /// Received data did not match the expectation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The transport failed to dispatch a message.
    #[error("Transport error on endpoint '{endpoint}': {reason}")]
    Transport {
        /// The endpoint name.
        endpoint: String,
        /// The failure reason.
        reason: String,
    },

    /// An endpoint was referenced that is not registered.
    #[error("Unknown endpoint '{name}'")]
    UnknownEndpoint {
        /// The endpoint name.
        name: String,
    },

    /// An inbound request named an operation with no handler.
    #[error("Unsupported operation '{operation}'")]
    UnknownOperation {
        /// The operation name.
        operation: String,
    },

    /// An iterate container exceeded its iteration guard.
    #[error("Iteration limit of {limit} exceeded")]
    IterationLimit {
        /// The configured limit.
        limit: u64,
    },

    /// A loop condition could not be evaluated.
    #[error("Invalid condition '{condition}': {reason}")]
    InvalidCondition {
        /// The resolved condition text.
        condition: String,
        /// Why evaluation failed.
        reason: String,
    },

    /// An action explicitly failed the test.
    #[error("{message}")]
    ActionFailed {
        /// The failure message.
        message: String,
    },

    /// An action wrapped in an assert-failure construct succeeded.
    #[error("Expected action '{action}' to fail, but it succeeded")]
    ExpectedFailure {
        /// The wrapped action name.
        action: String,
    },

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure of one parallel branch.
#[derive(Debug)]
pub struct BranchFailure {
    /// Zero based branch index in declaration order.
    pub index: usize,
    /// Name of the branch action.
    pub action: String,
    /// The branch error.
    pub error: TestflowError,
}

fn summarize(failures: &[BranchFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("[{}] {}: {}", f.index, f.action, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for TestflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl TestflowError {
    /// Creates an action timeout error.
    #[must_use]
    pub fn timeout(message: impl Into<String>, timeout_ms: u64) -> Self {
        Self::ActionTimeout {
            message: message.into(),
            timeout_ms,
        }
    }

    /// Creates a transport error.
    #[must_use]
    pub fn transport(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wraps a body failure with the template name.
    #[must_use]
    pub fn template_failed(template: impl Into<String>, source: Self) -> Self {
        Self::TemplateFailed {
            template: template.into(),
            source: Box::new(source),
        }
    }

    /// Returns the stable kind name used in events and diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownVariable { .. } => "UnknownVariable",
            Self::UnresolvableReference { .. } => "UnresolvableReference",
            Self::FunctionEvaluation { .. } => "FunctionEvaluationError",
            Self::ActionTimeout { .. } => "ActionTimeout",
            Self::UnknownTemplate { .. } => "UnknownTemplate",
            Self::TemplateFailed { .. } => "TemplateFailed",
            Self::MissingTemplateParameter { .. } => "MissingTemplateParameter",
            Self::ParallelFailure { .. } => "ParallelFailure",
            Self::CorrelationKeyMissing { .. } => "CorrelationKeyMissing",
            Self::Validation(_) => "ValidationError",
            Self::Transport { .. } => "TransportError",
            Self::UnknownEndpoint { .. } => "UnknownEndpoint",
            Self::UnknownOperation { .. } => "UnknownOperation",
            Self::IterationLimit { .. } => "IterationLimit",
            Self::InvalidCondition { .. } => "InvalidCondition",
            Self::ActionFailed { .. } => "ActionFailed",
            Self::ExpectedFailure { .. } => "ExpectedFailure",
            Self::Configuration(_) => "ConfigurationError",
            Self::Serialization(_) => "SerializationError",
            Self::Io(_) => "IoError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Returns true for timeouts, including timeouts nested in templates.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::ActionTimeout { .. } => true,
            Self::TemplateFailed { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Returns the innermost error, unwrapping template failures.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::TemplateFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), json!(self.kind()));
        map.insert("message".to_string(), json!(self.to_string()));

        match self {
            Self::TemplateFailed { template, source } => {
                map.insert("template".to_string(), json!(template));
                map.insert("cause".to_string(), json!(source.to_dict()));
            }
            Self::ParallelFailure { total, failures } => {
                map.insert("total".to_string(), json!(total));
                map.insert(
                    "failures".to_string(),
                    json!(failures
                        .iter()
                        .map(|f| json!({
                            "index": f.index,
                            "action": f.action,
                            "error": f.error.to_dict(),
                        }))
                        .collect::<Vec<_>>()),
                );
            }
            Self::ActionTimeout { timeout_ms, .. } => {
                map.insert("timeout_ms".to_string(), json!(timeout_ms));
            }
            _ => {}
        }

        map
    }
}

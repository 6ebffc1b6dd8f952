//! Descriptor types and their conversion into actions.

use crate::actions::{
    ActionRef, AssertFailureAction, CallTemplateAction, CreateVariablesAction, EchoAction,
    FailAction, ReceiveAction, SendAction, SleepAction,
};
use crate::containers::{ContextScope, Iterate, Parallel, Sequence};
use crate::endpoints::EndpointRegistry;
use crate::errors::TestflowError;
use crate::templates::{Template, TemplateParameter, TemplateRegistry};
use crate::validation::JsonMessageValidator;
use crate::variables::value_as_text;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Registries and limits used while building actions.
#[derive(Debug, Clone)]
pub struct BuildEnv {
    /// Endpoints referenced by send and receive descriptors.
    pub endpoints: Arc<EndpointRegistry>,
    /// Templates referenced by call descriptors.
    pub templates: Arc<TemplateRegistry>,
    /// Iteration guard for condition loops.
    pub max_iterations: u64,
}

fn shared() -> ContextScope {
    ContextScope::Shared
}

fn isolated() -> ContextScope {
    ContextScope::Isolated
}

fn global_context_default() -> bool {
    true
}

/// Descriptor of a single action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ActionSpec {
    /// Assigns variables.
    CreateVariables {
        /// Variables in assignment order.
        variables: IndexMap<String, Value>,
    },

    /// Logs a message.
    Echo {
        /// The message; may contain dynamic values.
        message: String,
    },

    /// Suspends the branch.
    Sleep {
        /// Milliseconds as a number or dynamic value.
        milliseconds: Value,
    },

    /// Fails the test.
    Fail {
        /// The failure message.
        message: String,
    },

    /// Expects the nested action to fail.
    AssertFailure {
        /// The action expected to fail.
        action: Box<ActionSpec>,
        /// Expected failure message or matcher.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Sends a message.
    Send {
        /// Endpoint name.
        endpoint: String,
        /// Message payload.
        #[serde(default)]
        payload: Value,
        /// Message headers.
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        headers: IndexMap<String, Value>,
        /// Explicit message id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message_id: Option<String>,
    },

    /// Receives and validates a reply.
    Receive {
        /// Endpoint name.
        endpoint: String,
        /// Expected payload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        /// Expected header values.
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        headers: IndexMap<String, String>,
        /// Timeout override in milliseconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        /// Explicit correlation key.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        selector: Option<String>,
        /// Header name to variable name.
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        extract_headers: IndexMap<String, String>,
        /// JSON pointer to variable name.
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        extract_payload: IndexMap<String, String>,
        /// Allow payload fields the expectation does not name.
        #[serde(default)]
        lenient: bool,
    },

    /// Calls a template.
    CallTemplate {
        /// Template name.
        template: String,
        /// Parameter values.
        #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
        parameters: IndexMap<String, Value>,
        /// Override of the template's context sharing.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        global_context: Option<bool>,
    },

    /// Runs children in order.
    Sequential {
        /// Child actions.
        actions: Vec<ActionSpec>,
        /// Scope policy; shared unless stated.
        #[serde(default = "shared")]
        scope: ContextScope,
    },

    /// Runs children concurrently.
    Parallel {
        /// Branch actions.
        actions: Vec<ActionSpec>,
        /// Scope policy; isolated unless stated.
        #[serde(default = "isolated")]
        scope: ContextScope,
    },

    /// Repeats children.
    Iterate {
        /// Child actions.
        actions: Vec<ActionSpec>,
        /// Number of passes.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<u64>,
        /// Loop condition.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        condition: Option<String>,
        /// Index variable name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<String>,
        /// First index value.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start: Option<i64>,
        /// Index increment.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<i64>,
        /// Iteration guard override.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u64>,
        /// Scope policy; shared unless stated.
        #[serde(default = "shared")]
        scope: ContextScope,
    },
}

impl ActionSpec {
    /// Builds the executable action.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEndpoint` for unregistered endpoints and
    /// `Configuration` for inconsistent descriptors.
    pub fn build(&self, env: &BuildEnv) -> Result<ActionRef, TestflowError> {
        let action: ActionRef = match self {
            Self::CreateVariables { variables } => {
                Arc::new(CreateVariablesAction::from_map(variables.clone()))
            }
            Self::Echo { message } => Arc::new(EchoAction::new(message.clone())),
            Self::Sleep { milliseconds } => {
                Arc::new(SleepAction::from_expression(value_as_text(milliseconds)))
            }
            Self::Fail { message } => Arc::new(FailAction::new(message.clone())),
            Self::AssertFailure { action, message } => {
                let mut assert = AssertFailureAction::new(action.build(env)?);
                if let Some(expected) = message {
                    assert = assert.with_message(expected.clone());
                }
                Arc::new(assert)
            }
            Self::Send {
                endpoint,
                payload,
                headers,
                message_id,
            } => {
                let mut send = SendAction::new(env.endpoints.get(endpoint)?, payload.clone());
                for (name, value) in headers {
                    send = send.header(name.clone(), value.clone());
                }
                if let Some(id) = message_id {
                    send = send.with_message_id(id.clone());
                }
                Arc::new(send)
            }
            Self::Receive {
                endpoint,
                payload,
                headers,
                timeout_ms,
                selector,
                extract_headers,
                extract_payload,
                lenient,
            } => {
                let mut receive = ReceiveAction::new(env.endpoints.get(endpoint)?);
                if let Some(payload) = payload {
                    receive = receive.expect_payload(payload.clone());
                }
                for (name, expected) in headers {
                    receive = receive.expect_header(name.clone(), expected.clone());
                }
                if let Some(timeout_ms) = timeout_ms {
                    receive = receive.with_timeout(Duration::from_millis(*timeout_ms));
                }
                if let Some(selector) = selector {
                    receive = receive.with_selector(selector.clone());
                }
                for (header, variable) in extract_headers {
                    receive = receive.extract_header(header.clone(), variable.clone());
                }
                for (pointer, variable) in extract_payload {
                    receive = receive.extract_payload(pointer.clone(), variable.clone());
                }
                if *lenient {
                    receive = receive.with_validator(Arc::new(JsonMessageValidator::lenient()));
                }
                Arc::new(receive)
            }
            Self::CallTemplate {
                template,
                parameters,
                global_context,
            } => {
                let mut call = CallTemplateAction::new(Arc::clone(&env.templates), template.clone());
                for (name, value) in parameters {
                    call = call.parameter(name.clone(), value.clone());
                }
                if let Some(global_context) = global_context {
                    call = call.with_global_context(*global_context);
                }
                Arc::new(call)
            }
            Self::Sequential { actions, scope } => Arc::new(
                Sequence::new()
                    .with_scope(*scope)
                    .actions(build_all(actions, env)?),
            ),
            Self::Parallel { actions, scope } => Arc::new(
                Parallel::new()
                    .with_scope(*scope)
                    .actions(build_all(actions, env)?),
            ),
            Self::Iterate {
                actions,
                count,
                condition,
                index,
                start,
                step,
                max_iterations,
                scope,
            } => {
                let mut iterate = match (count, condition) {
                    (Some(count), None) => Iterate::times(*count),
                    (None, Some(condition)) => Iterate::while_condition(condition.clone()),
                    _ => {
                        return Err(TestflowError::Configuration(
                            "iterate needs exactly one of 'count' or 'condition'".to_string(),
                        ))
                    }
                };
                if let Some(index) = index {
                    iterate = iterate.with_index(index.clone());
                }
                if let Some(start) = start {
                    iterate = iterate.with_start(*start);
                }
                if let Some(step) = step {
                    iterate = iterate.with_step(*step);
                }
                Arc::new(
                    iterate
                        .with_max_iterations(max_iterations.unwrap_or(env.max_iterations))
                        .with_scope(*scope)
                        .actions(build_all(actions, env)?),
                )
            }
        };

        Ok(action)
    }
}

fn build_all(specs: &[ActionSpec], env: &BuildEnv) -> Result<Vec<ActionRef>, TestflowError> {
    specs.iter().map(|spec| spec.build(env)).collect()
}

/// Descriptor of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSpec {
    /// Template name.
    pub name: String,
    /// Declared parameters.
    #[serde(default)]
    pub parameters: Vec<TemplateParameter>,
    /// Whether the body shares the caller's context.
    #[serde(default = "global_context_default")]
    pub global_context: bool,
    /// Template body.
    pub actions: Vec<ActionSpec>,
}

impl TemplateSpec {
    /// Builds the template.
    ///
    /// # Errors
    ///
    /// Returns the first error building the body.
    pub fn build(&self, env: &BuildEnv) -> Result<Template, TestflowError> {
        let template = self
            .parameters
            .iter()
            .cloned()
            .fold(Template::new(self.name.clone()), Template::parameter);
        Ok(template
            .with_global_context(self.global_context)
            .actions(build_all(&self.actions, env)?))
    }
}

/// Descriptor of a whole test case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseSpec {
    /// Test name.
    pub name: String,
    /// Initial variables.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, Value>,
    /// Templates registered before the test runs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<TemplateSpec>,
    /// Top-level actions.
    pub actions: Vec<ActionSpec>,
}

impl TestCaseSpec {
    /// Parses a test case from JSON.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` for malformed input.
    pub fn from_json(json: &str) -> Result<Self, TestflowError> {
        Ok(serde_json::from_str(json)?)
    }
}

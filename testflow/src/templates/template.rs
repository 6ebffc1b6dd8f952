//! Template definition.

use crate::actions::{ActionRef, TestAction};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// A declared template parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateParameter {
    /// Parameter name, bound as a variable of the same name.
    pub name: String,

    /// Value used when the caller does not supply one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl TemplateParameter {
    /// Creates a required parameter.
    #[must_use]
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
        }
    }

    /// Creates a parameter with a default value.
    #[must_use]
    pub fn with_default(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: Some(default.into()),
        }
    }
}

/// A named, reusable action sequence.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    actions: Vec<ActionRef>,
    parameters: Vec<TemplateParameter>,
    global_context: bool,
}

impl Template {
    /// Creates an empty template that shares the caller's context.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: Vec::new(),
            parameters: Vec::new(),
            global_context: true,
        }
    }

    /// Sets whether the body shares the caller's context.
    #[must_use]
    pub fn with_global_context(mut self, global_context: bool) -> Self {
        self.global_context = global_context;
        self
    }

    /// Declares a parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: TemplateParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Appends an action to the body.
    #[must_use]
    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    /// Appends shared actions to the body.
    #[must_use]
    pub fn actions(mut self, actions: impl IntoIterator<Item = ActionRef>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Returns the template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the body.
    #[must_use]
    pub fn body(&self) -> &[ActionRef] {
        &self.actions
    }

    /// Returns the declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[TemplateParameter] {
        &self.parameters
    }

    /// Returns true if the body shares the caller's context.
    #[must_use]
    pub fn global_context(&self) -> bool {
        self.global_context
    }
}

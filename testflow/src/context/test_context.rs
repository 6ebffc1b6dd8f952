//! The scope object carried through one action or branch.

use crate::errors::TestflowError;
use crate::events::{get_event_sink, EventSink, TestEvent};
use crate::variables::{
    resolve_text, resolve_value, value_as_text, FunctionLibrary, ValidationMatcherLibrary,
    VariableStore,
};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// The context a test action executes against.
///
/// A context owns one variable store and holds shared, read-only handles to
/// the function library, the validation matcher library and the event sink.
/// Cloning a context is cheap and shares the store; use [`TestContext::derive`]
/// to pick between a shared and an isolated store.
#[derive(Clone)]
pub struct TestContext {
    /// Variables visible to this scope.
    variables: Arc<VariableStore>,
    /// Functions available to resolution.
    functions: Arc<FunctionLibrary>,
    /// Matchers available to validation.
    matchers: Arc<ValidationMatcherLibrary>,
    /// Event sink for emitting events.
    event_sink: Arc<dyn EventSink>,
    /// Test run id shared by every derived context.
    run_id: Uuid,
    /// Test case name.
    test_name: Option<Arc<str>>,
    /// Whether this context got its own copy of the store.
    isolated: bool,
}

impl TestContext {
    /// Creates a new root context with the built-in libraries.
    #[must_use]
    pub fn new() -> Self {
        Self {
            variables: Arc::new(VariableStore::new()),
            functions: Arc::new(FunctionLibrary::builtin()),
            matchers: Arc::new(ValidationMatcherLibrary::builtin()),
            event_sink: get_event_sink(),
            run_id: crate::utils::generate_uuid(),
            test_name: None,
            isolated: false,
        }
    }

    /// Sets the function library.
    #[must_use]
    pub fn with_functions(mut self, functions: Arc<FunctionLibrary>) -> Self {
        self.functions = functions;
        self
    }

    /// Sets the validation matcher library.
    #[must_use]
    pub fn with_matchers(mut self, matchers: Arc<ValidationMatcherLibrary>) -> Self {
        self.matchers = matchers;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the test case name.
    #[must_use]
    pub fn with_test_name(mut self, name: impl AsRef<str>) -> Self {
        self.test_name = Some(Arc::from(name.as_ref()));
        self
    }

    /// Seeds the store with variables.
    #[must_use]
    pub fn with_variables(self, variables: IndexMap<String, Value>) -> Self {
        for (name, value) in variables {
            self.variables.set(name, value);
        }
        self
    }

    /// Derives a child context.
    ///
    /// When `isolated` is false the child shares this context's store and
    /// writes are visible both ways. When true the child receives a snapshot
    /// copy and its writes never reach this context.
    #[must_use]
    pub fn derive(&self, isolated: bool) -> Self {
        let variables = if isolated {
            Arc::new(self.variables.as_ref().clone())
        } else {
            Arc::clone(&self.variables)
        };

        Self {
            variables,
            functions: Arc::clone(&self.functions),
            matchers: Arc::clone(&self.matchers),
            event_sink: Arc::clone(&self.event_sink),
            run_id: self.run_id,
            test_name: self.test_name.clone(),
            isolated,
        }
    }

    /// Returns true if this context was derived with an isolated store.
    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.isolated
    }

    /// Returns true if both contexts write to the same store.
    #[must_use]
    pub fn shares_variables_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.variables, &other.variables)
    }

    /// Returns the variable store.
    #[must_use]
    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// Returns the function library.
    #[must_use]
    pub fn functions(&self) -> &FunctionLibrary {
        &self.functions
    }

    /// Returns the validation matcher library.
    #[must_use]
    pub fn matchers(&self) -> &ValidationMatcherLibrary {
        &self.matchers
    }

    /// Returns the event sink.
    #[must_use]
    pub fn event_sink(&self) -> &Arc<dyn EventSink> {
        &self.event_sink
    }

    /// Returns the test run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the test case name.
    #[must_use]
    pub fn test_name(&self) -> Option<&str> {
        self.test_name.as_deref()
    }

    /// Sets a variable.
    pub fn set_variable(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.variables.set(name, value);
    }

    /// Gets a variable.
    ///
    /// # Errors
    ///
    /// Returns `UnknownVariable` if the name is not defined.
    pub fn variable(&self, name: &str) -> Result<Value, TestflowError> {
        self.variables.get(name)
    }

    /// Gets a variable in its text form.
    pub fn variable_text(&self, name: &str) -> Result<String, TestflowError> {
        self.variables.get(name).map(|v| value_as_text(&v))
    }

    /// Checks if a variable is defined.
    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains(name)
    }

    /// Resolves variable references and function calls in `text`.
    pub fn resolve(&self, text: &str) -> Result<String, TestflowError> {
        resolve_text(text, self)
    }

    /// Resolves every string inside a JSON value.
    pub fn resolve_value(&self, value: &Value) -> Result<Value, TestflowError> {
        resolve_value(value, self)
    }

    /// Validates `actual` against an expected value or matcher expression.
    pub fn validate(&self, path: &str, expected: &str, actual: &str) -> Result<(), TestflowError> {
        self.matchers.validate(path, expected, actual, self)
    }

    /// Emits an event enriched with the run id and test name.
    ///
    /// Delivery is fire-and-forget: the sink's `try_emit` is used so actions
    /// never await event delivery.
    pub fn emit(&self, event: TestEvent) {
        tracing::trace!(event_type = %event.event_type, "emitting event");
        let mut event = event.add_data("run_id", serde_json::json!(self.run_id.to_string()));
        if let Some(ref name) = self.test_name {
            event = event.add_data("test", serde_json::json!(name.as_ref()));
        }
        self.event_sink.try_emit(&event);
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestContext")
            .field("run_id", &self.run_id)
            .field("test_name", &self.test_name)
            .field("isolated", &self.isolated)
            .field("variables", &self.variables.names())
            .finish_non_exhaustive()
    }
}

//! Template call action.

use super::TestAction;
use crate::context::TestContext;
use crate::errors::TestflowError;
use crate::templates::TemplateRegistry;
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Invokes a registered template.
///
/// The template is looked up when the action runs, so templates may be
/// registered after the calling test is built.
#[derive(Clone)]
pub struct CallTemplateAction {
    registry: Arc<TemplateRegistry>,
    template: String,
    action_name: String,
    parameters: IndexMap<String, Value>,
    global_context: Option<bool>,
}

impl CallTemplateAction {
    /// Creates a call of the named template.
    #[must_use]
    pub fn new(registry: Arc<TemplateRegistry>, template: impl Into<String>) -> Self {
        let template = template.into();
        Self {
            registry,
            action_name: format!("call-template:{template}"),
            template,
            parameters: IndexMap::new(),
            global_context: None,
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Overrides the template's context sharing.
    #[must_use]
    pub fn with_global_context(mut self, global_context: bool) -> Self {
        self.global_context = Some(global_context);
        self
    }
}

#[async_trait]
impl TestAction for CallTemplateAction {
    fn name(&self) -> &str {
        &self.action_name
    }

    async fn execute(&self, ctx: &TestContext) -> Result<(), TestflowError> {
        self.registry
            .invoke(&self.template, &self.parameters, ctx, self.global_context)
            .await
    }
}

impl fmt::Debug for CallTemplateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallTemplateAction")
            .field("template", &self.template)
            .field("parameters", &self.parameters)
            .field("global_context", &self.global_context)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::EchoAction;
    use crate::containers::{ContextScope, Parallel};
    use crate::events::CollectingEventSink;
    use crate::templates::{Template, TemplateParameter};

    fn print_registry(global_context: bool) -> Arc<TemplateRegistry> {
        let registry = Arc::new(TemplateRegistry::new());
        registry.register(
            Template::new("print")
                .with_global_context(global_context)
                .parameter(TemplateParameter::required("param1"))
                .parameter(TemplateParameter::required("param2"))
                .action(EchoAction::new("${param1}.${param2}")),
        );
        registry
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_isolated_template_calls_in_parallel_keep_their_parameters() {
        let registry = print_registry(false);
        let sink = Arc::new(CollectingEventSink::new());
        let ctx = TestContext::new().with_event_sink(sink.clone());

        let call = |param1: i64, param2: &str| {
            CallTemplateAction::new(registry.clone(), "print")
                .parameter("param1", param1)
                .parameter("param2", param2)
        };
        let parallel = Parallel::new()
            .with_scope(ContextScope::Shared)
            .action(call(1, "A"))
            .action(call(2, "B"))
            .action(call(3, "C"));

        for _ in 0..20 {
            sink.clear();
            parallel.execute(&ctx).await.unwrap();

            let mut echoed = sink.echoed();
            echoed.sort();
            assert_eq!(echoed, vec!["1.A", "2.B", "3.C"]);
        }
        assert!(!ctx.has_variable("param1"));
    }

    #[tokio::test]
    async fn test_action_name_includes_template() {
        let action = CallTemplateAction::new(print_registry(true), "print");
        assert_eq!(action.name(), "call-template:print");
    }

    #[tokio::test]
    async fn test_late_registration_is_found() {
        let registry = Arc::new(TemplateRegistry::new());
        let action = CallTemplateAction::new(registry.clone(), "later");
        registry.register(Template::new("later"));

        assert!(action.execute(&TestContext::new()).await.is_ok());
    }
}

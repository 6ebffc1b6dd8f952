//! Template registry and invocation.

use super::Template;
use crate::containers::run_sequence;
use crate::context::TestContext;
use crate::errors::TestflowError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Templates available to a test run, by name.
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: RwLock<HashMap<String, Arc<Template>>>,
}

impl TemplateRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a template, replacing one with the same name.
    pub fn register(&self, template: Template) -> Arc<Template> {
        let template = Arc::new(template);
        self.templates
            .write()
            .insert(template.name().to_string(), Arc::clone(&template));
        template
    }

    /// Gets a template.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTemplate` if no template has the name.
    pub fn get(&self, name: &str) -> Result<Arc<Template>, TestflowError> {
        self.templates
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| TestflowError::UnknownTemplate {
                name: name.to_string(),
            })
    }

    /// Checks if a template is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.templates.read().contains_key(name)
    }

    /// Returns all template names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.templates.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Invokes a template.
    ///
    /// Parameter values are resolved against the caller's context before any
    /// of them is bound: text is resolved, structured values are bound as
    /// given. Declared parameters the caller omits fall back to their
    /// default. `global_context` overrides the template's own setting.
    ///
    /// # Errors
    ///
    /// Returns `UnknownTemplate`, `MissingTemplateParameter`, a resolution
    /// error for a parameter, or `TemplateFailed` wrapping the first failure
    /// of the body.
    pub async fn invoke(
        &self,
        name: &str,
        parameters: &IndexMap<String, Value>,
        caller: &TestContext,
        global_context: Option<bool>,
    ) -> Result<(), TestflowError> {
        let template = self.get(name)?;
        let bindings = bind_parameters(&template, parameters, caller)?;

        let global_context = global_context.unwrap_or_else(|| template.global_context());
        let ctx = caller.derive(!global_context);
        for (parameter, value) in bindings {
            ctx.set_variable(parameter, value);
        }

        info!(
            template = name,
            global_context,
            actions = template.body().len(),
            "Executing template"
        );

        run_sequence(template.body(), &ctx)
            .await
            .map_err(|err| TestflowError::template_failed(name, err))?;

        debug!(template = name, "Template finished");
        Ok(())
    }
}

fn bind_parameters(
    template: &Template,
    supplied: &IndexMap<String, Value>,
    caller: &TestContext,
) -> Result<IndexMap<String, Value>, TestflowError> {
    let mut bindings = IndexMap::with_capacity(supplied.len());

    for declared in template.parameters() {
        if supplied.contains_key(&declared.name) {
            continue;
        }
        let default = declared
            .default
            .as_ref()
            .ok_or_else(|| TestflowError::MissingTemplateParameter {
                template: template.name().to_string(),
                parameter: declared.name.clone(),
            })?;
        bindings.insert(declared.name.clone(), resolve_parameter(default, caller)?);
    }

    for (name, value) in supplied {
        bindings.insert(name.clone(), resolve_parameter(value, caller)?);
    }

    Ok(bindings)
}

fn resolve_parameter(value: &Value, caller: &TestContext) -> Result<Value, TestflowError> {
    match value {
        Value::String(text) => Ok(Value::String(caller.resolve(text)?)),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{CreateVariablesAction, EchoAction, FailAction};
    use crate::templates::TemplateParameter;
    use crate::events::CollectingEventSink;
    use serde_json::json;

    fn params(entries: &[(&str, Value)]) -> IndexMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn mutating_template(global_context: bool) -> Template {
        Template::new("mutate")
            .with_global_context(global_context)
            .action(CreateVariablesAction::new().variable("x", "changed"))
    }

    #[tokio::test]
    async fn test_shared_template_mutation_is_visible() {
        let registry = TemplateRegistry::new();
        registry.register(mutating_template(true));
        let ctx = TestContext::new();
        ctx.set_variable("x", "original");

        registry.invoke("mutate", &IndexMap::new(), &ctx, None).await.unwrap();
        assert_eq!(ctx.variable_text("x").unwrap(), "changed");
    }

    #[tokio::test]
    async fn test_isolated_template_mutation_is_discarded() {
        let registry = TemplateRegistry::new();
        registry.register(mutating_template(false));
        let ctx = TestContext::new();
        ctx.set_variable("x", "original");

        registry.invoke("mutate", &IndexMap::new(), &ctx, None).await.unwrap();
        assert_eq!(ctx.variable_text("x").unwrap(), "original");
    }

    #[tokio::test]
    async fn test_override_forces_isolation() {
        let registry = TemplateRegistry::new();
        registry.register(mutating_template(true));
        let ctx = TestContext::new();
        ctx.set_variable("x", "original");

        registry.invoke("mutate", &IndexMap::new(), &ctx, Some(false)).await.unwrap();
        assert_eq!(ctx.variable_text("x").unwrap(), "original");
    }

    #[tokio::test]
    async fn test_parameters_resolve_against_caller() {
        let sink = Arc::new(CollectingEventSink::new());
        let registry = TemplateRegistry::new();
        registry.register(
            Template::new("greet")
                .with_global_context(false)
                .parameter(TemplateParameter::required("who"))
                .parameter(TemplateParameter::with_default("greeting", "Hello"))
                .action(EchoAction::new("${greeting} ${who}")),
        );
        let ctx = TestContext::new().with_event_sink(sink.clone());
        ctx.set_variable("user", "Ada");

        registry
            .invoke("greet", &params(&[("who", json!("${user}"))]), &ctx, None)
            .await
            .unwrap();

        assert_eq!(sink.echoed(), vec!["Hello Ada"]);
        assert!(!ctx.has_variable("who"));
    }

    #[tokio::test]
    async fn test_structured_parameter_bound_as_is() {
        let registry = TemplateRegistry::new();
        registry.register(Template::new("noop"));
        let ctx = TestContext::new();

        registry
            .invoke("noop", &params(&[("order", json!({"id": "${unresolved}"}))]), &ctx, None)
            .await
            .unwrap();
        assert_eq!(ctx.variable("order").unwrap(), json!({"id": "${unresolved}"}));
    }

    #[tokio::test]
    async fn test_missing_parameter() {
        let registry = TemplateRegistry::new();
        registry.register(Template::new("needs").parameter(TemplateParameter::required("p")));

        let err = registry
            .invoke("needs", &IndexMap::new(), &TestContext::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "MissingTemplateParameter");
    }

    #[tokio::test]
    async fn test_unknown_template() {
        let err = TemplateRegistry::new()
            .invoke("ghost", &IndexMap::new(), &TestContext::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UnknownTemplate");
    }

    #[tokio::test]
    async fn test_body_failure_is_wrapped() {
        let registry = TemplateRegistry::new();
        registry.register(Template::new("broken").action(FailAction::new("inner")));

        let err = registry
            .invoke("broken", &IndexMap::new(), &TestContext::new(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TemplateFailed");
        assert_eq!(err.root_cause().to_string(), "inner");
    }
}

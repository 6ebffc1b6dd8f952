//! Test runner.

use super::TestResult;
use crate::actions::{ActionRef, TestAction};
use crate::builder::{BuildEnv, TestCaseSpec};
use crate::config::EngineConfig;
use crate::containers::run_sequence;
use crate::context::TestContext;
use crate::endpoints::{Endpoint, EndpointRegistry, Transport};
use crate::errors::TestflowError;
use crate::events::{get_event_sink, EventSink, TestEvent};
use crate::observability::test_span;
use crate::templates::{Template, TemplateRegistry};
use crate::variables::{FunctionLibrary, ValidationMatcherLibrary};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn, Instrument};

/// A test case: initial variables and a top-level action sequence.
#[derive(Debug, Clone)]
pub struct TestCase {
    name: String,
    variables: IndexMap<String, Value>,
    actions: Vec<ActionRef>,
}

impl TestCase {
    /// Creates an empty test case.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: IndexMap::new(),
            actions: Vec::new(),
        }
    }

    /// Adds an initial variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Appends an action.
    #[must_use]
    pub fn action(mut self, action: impl TestAction + 'static) -> Self {
        self.actions.push(Arc::new(action));
        self
    }

    /// Appends shared actions.
    #[must_use]
    pub fn actions(mut self, actions: impl IntoIterator<Item = ActionRef>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Returns the test name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the initial variables.
    #[must_use]
    pub fn variables(&self) -> &IndexMap<String, Value> {
        &self.variables
    }

    /// Returns the number of top-level actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if the test has no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Runs test cases against a set of endpoints and templates.
///
/// Endpoints and templates registered on the runner are visible to every
/// test case it runs. Each run gets a fresh root context.
pub struct TestRunner {
    config: EngineConfig,
    functions: Arc<FunctionLibrary>,
    matchers: Arc<ValidationMatcherLibrary>,
    endpoints: Arc<EndpointRegistry>,
    templates: Arc<TemplateRegistry>,
    event_sink: Arc<dyn EventSink>,
}

impl TestRunner {
    /// Creates a runner with the built-in libraries.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let functions = FunctionLibrary::builtin().with_prefix(config.function_prefix.clone());
        Self {
            functions: Arc::new(functions),
            matchers: Arc::new(ValidationMatcherLibrary::builtin()),
            endpoints: Arc::new(EndpointRegistry::new()),
            templates: Arc::new(TemplateRegistry::new()),
            event_sink: get_event_sink(),
            config,
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the function library.
    #[must_use]
    pub fn with_functions(mut self, functions: FunctionLibrary) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    /// Sets the validation matcher library.
    #[must_use]
    pub fn with_matchers(mut self, matchers: ValidationMatcherLibrary) -> Self {
        self.matchers = Arc::new(matchers);
        self
    }

    /// Returns the engine settings.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates and registers an endpoint using the engine's receive settings.
    pub fn create_endpoint(
        &self,
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Arc<Endpoint> {
        self.register_endpoint(Endpoint::with_config(
            name,
            transport,
            self.config.endpoint_config(),
        ))
    }

    /// Registers a preconfigured endpoint.
    pub fn register_endpoint(&self, endpoint: Endpoint) -> Arc<Endpoint> {
        self.endpoints.register(endpoint)
    }

    /// Looks up an endpoint.
    ///
    /// # Errors
    ///
    /// Returns `UnknownEndpoint` if no endpoint has that name.
    pub fn endpoint(&self, name: &str) -> Result<Arc<Endpoint>, TestflowError> {
        self.endpoints.get(name)
    }

    /// Returns the endpoint registry.
    #[must_use]
    pub fn endpoints(&self) -> &Arc<EndpointRegistry> {
        &self.endpoints
    }

    /// Returns the template registry.
    #[must_use]
    pub fn templates(&self) -> &Arc<TemplateRegistry> {
        &self.templates
    }

    /// Registers a template.
    pub fn register_template(&self, template: Template) -> Arc<Template> {
        self.templates.register(template)
    }

    /// Returns the registries descriptors are built against.
    #[must_use]
    pub fn build_env(&self) -> BuildEnv {
        BuildEnv {
            endpoints: Arc::clone(&self.endpoints),
            templates: Arc::clone(&self.templates),
            max_iterations: self.config.max_iterations,
        }
    }

    /// Builds a test case from its descriptor, registering its templates.
    ///
    /// # Errors
    ///
    /// Returns the first error building a template or action.
    pub fn build_test(&self, spec: &TestCaseSpec) -> Result<TestCase, TestflowError> {
        let env = self.build_env();
        for template in &spec.templates {
            self.register_template(template.build(&env)?);
        }

        let actions = spec
            .actions
            .iter()
            .map(|action| action.build(&env))
            .collect::<Result<Vec<_>, _>>()?;

        let mut test = TestCase::new(spec.name.clone()).actions(actions);
        test.variables.clone_from(&spec.variables);
        Ok(test)
    }

    /// Builds and runs a test case descriptor.
    ///
    /// A descriptor that cannot be built yields a failed result.
    pub async fn run_spec(&self, spec: &TestCaseSpec) -> TestResult {
        match self.build_test(spec) {
            Ok(test) => self.run(&test).await,
            Err(err) => {
                warn!(test = %spec.name, error = %err, "Test case could not be built");
                TestResult::failure(spec.name.clone(), crate::utils::generate_uuid(), &err, 0.0)
            }
        }
    }

    /// Runs a test case against a fresh root context.
    pub async fn run(&self, test: &TestCase) -> TestResult {
        let ctx = self.root_context(test);
        let span = test_span(test.name(), ctx.run_id());
        self.run_in(test, ctx).instrument(span).await
    }

    fn root_context(&self, test: &TestCase) -> TestContext {
        TestContext::new()
            .with_functions(Arc::clone(&self.functions))
            .with_matchers(Arc::clone(&self.matchers))
            .with_event_sink(Arc::clone(&self.event_sink))
            .with_test_name(test.name())
            .with_variables(test.variables.clone())
    }

    async fn run_in(&self, test: &TestCase, ctx: TestContext) -> TestResult {
        info!(actions = test.len(), "Test started");
        ctx.emit(TestEvent::test_started(test.name()));
        let start = Instant::now();

        let outcome = run_sequence(&test.actions, &ctx).await;
        let duration_ms = crate::utils::duration_ms(start.elapsed());

        let result = match outcome {
            Ok(()) => {
                info!(duration_ms, "Test succeeded");
                TestResult::success(test.name(), ctx.run_id(), duration_ms)
            }
            Err(err) => {
                warn!(duration_ms, error = %err, kind = err.kind(), "Test failed");
                TestResult::failure(test.name(), ctx.run_id(), &err, duration_ms)
            }
        };

        ctx.emit(TestEvent::test_finished(test.name(), result.success, duration_ms));
        result
    }
}

impl fmt::Debug for TestRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestRunner")
            .field("config", &self.config)
            .field("endpoints", &self.endpoints.names())
            .field("templates", &self.templates.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{
        CallTemplateAction, CreateVariablesAction, EchoAction, FailAction, ReceiveAction,
        SendAction,
    };
    use crate::containers::{ContextScope, Parallel, Sequence};
    use crate::endpoints::OperationDispatcher;
    use crate::events::{CollectingEventSink, TEST_FINISHED, TEST_STARTED};
    use crate::message::OPERATION_HEADER;
    use crate::templates::TemplateParameter;
    use crate::testing::{
        assert_test_failed_with, assert_test_succeeded, EchoTransport, RecordingAction,
        RecordingTransport,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn runner() -> (TestRunner, Arc<CollectingEventSink>) {
        let sink = Arc::new(CollectingEventSink::new());
        let config = EngineConfig::default()
            .with_receive_timeout_ms(500)
            .with_polling_interval_ms(20);
        (TestRunner::new(config).with_event_sink(sink.clone()), sink)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_print_template_from_descriptor() {
        let (runner, sink) = runner();
        let spec = TestCaseSpec::from_json(
            r#"{
                "name": "print-scenario",
                "templates": [{
                    "name": "print",
                    "global_context": false,
                    "parameters": [{"name": "param1"}, {"name": "param2"}],
                    "actions": [{"type": "echo", "message": "${param1}.${param2}"}]
                }],
                "actions": [{
                    "type": "parallel",
                    "scope": "shared",
                    "actions": [
                        {"type": "call-template", "template": "print", "parameters": {"param1": 1, "param2": "A"}},
                        {"type": "call-template", "template": "print", "parameters": {"param1": 2, "param2": "B"}},
                        {"type": "call-template", "template": "print", "parameters": {"param1": 3, "param2": "C"}}
                    ]
                }]
            }"#,
        )
        .unwrap();

        let test = tokio_test::assert_ok!(runner.build_test(&spec));
        for _ in 0..10 {
            sink.clear();
            let result = runner.run(&test).await;
            assert_test_succeeded(&result);

            let mut echoed = sink.echoed();
            echoed.sort();
            assert_eq!(echoed, vec!["1.A", "2.B", "3.C"]);
        }
    }

    #[tokio::test]
    async fn test_template_mutation_shared_vs_isolated() {
        let (runner, _) = runner();
        runner.register_template(
            Template::new("mutate")
                .parameter(TemplateParameter::with_default("value", "changed"))
                .action(CreateVariablesAction::new().variable("target", "${value}")),
        );
        let recorder = RecordingAction::new("recorder").capturing("target");

        let call = |global: bool| {
            CallTemplateAction::new(runner.templates().clone(), "mutate").with_global_context(global)
        };

        let isolated = TestCase::new("isolated")
            .with_variable("target", "original")
            .action(call(false))
            .action(recorder.clone());
        assert_test_succeeded(&runner.run(&isolated).await);

        let shared = TestCase::new("shared")
            .with_variable("target", "original")
            .action(call(true))
            .action(recorder.clone());
        assert_test_succeeded(&runner.run(&shared).await);

        assert_eq!(recorder.captured(), vec!["original", "changed"]);
    }

    #[tokio::test]
    async fn test_sequence_aborts_on_second_failure() {
        let (runner, sink) = runner();
        let after = RecordingAction::new("after");
        let test = TestCase::new("abort")
            .action(EchoAction::new("first"))
            .action(FailAction::new("second failed"))
            .action(after.clone());

        let result = runner.run(&test).await;

        assert_test_failed_with(&result, "ActionFailed");
        assert!(result.error.as_deref().unwrap_or_default().contains("second failed"));
        assert_eq!(after.executions(), 0);
        assert_eq!(sink.echoed(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_send_receive_through_echo_endpoint() {
        let (runner, _) = runner();
        let endpoint = runner.create_endpoint("orders", Arc::new(EchoTransport::new()));

        let test = TestCase::new("roundtrip")
            .with_variable("orderId", "4711")
            .action(SendAction::new(endpoint.clone(), json!({"order": "${orderId}"})))
            .action(ReceiveAction::new(endpoint).expect_payload(json!({"order": "@startsWith('47')@"})));

        assert_test_succeeded(&runner.run(&test).await);
    }

    #[tokio::test]
    async fn test_operation_dispatcher_endpoint() {
        let (runner, _) = runner();
        let dispatcher = OperationDispatcher::new().with_operation("total", |request: crate::message::Message| async move {
            let items = request.payload["items"].as_array().map_or(0, Vec::len);
            Ok::<_, TestflowError>(json!({"count": items}))
        });
        let endpoint = runner.create_endpoint("billing", Arc::new(dispatcher));

        let test = TestCase::new("dispatch")
            .action(
                SendAction::new(endpoint.clone(), json!({"items": [1, 2, 3]}))
                    .header(OPERATION_HEADER, "total"),
            )
            .action(ReceiveAction::new(endpoint).expect_payload(json!({"count": 3})));

        assert_test_succeeded(&runner.run(&test).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_receive_without_reply_times_out() {
        let (runner, _) = runner();
        let endpoint = runner.create_endpoint("silent", Arc::new(RecordingTransport::new()));

        let test = TestCase::new("timeout")
            .action(SendAction::new(endpoint.clone(), "ping"))
            .action(ReceiveAction::new(endpoint));

        let result = runner.run(&test).await;
        assert_test_failed_with(&result, "ActionTimeout");
    }

    #[tokio::test]
    async fn test_parallel_failures_are_aggregated() {
        let (runner, _) = runner();
        let test = TestCase::new("parallel-failures").action(
            Parallel::new()
                .with_scope(ContextScope::Isolated)
                .action(FailAction::new("left"))
                .action(EchoAction::new("middle"))
                .action(FailAction::new("right")),
        );

        let result = runner.run(&test).await;

        assert_test_failed_with(&result, "ParallelFailure");
        let error = result.error.unwrap_or_default();
        assert!(error.contains("left"));
        assert!(error.contains("right"));
    }

    #[tokio::test]
    async fn test_run_emits_lifecycle_events() {
        let (runner, sink) = runner();
        let test = TestCase::new("events").action(Sequence::new().action(EchoAction::new("x")));

        let result = runner.run(&test).await;

        let started = sink.events_of_type(TEST_STARTED);
        let finished = sink.events_of_type(TEST_FINISHED);
        assert_eq!(started.len(), 1);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].data_str("test"), Some("events"));
        assert_eq!(
            finished[0].data_str("run_id"),
            Some(result.run_id.to_string().as_str())
        );
    }

    #[tokio::test]
    async fn test_unbuildable_descriptor_fails_result() {
        let (runner, _) = runner();
        let spec = TestCaseSpec::from_json(
            r#"{"name": "broken", "actions": [{"type": "send", "endpoint": "nowhere"}]}"#,
        )
        .unwrap();

        let result = runner.run_spec(&spec).await;
        assert_test_failed_with(&result, "UnknownEndpoint");
    }

    #[test]
    fn test_custom_function_prefix() {
        let runner = TestRunner::new(EngineConfig::default().with_function_prefix("fn"));
        let test = TestCase::new("prefix");
        let ctx = runner.root_context(&test);
        assert_eq!(ctx.resolve("fn:upperCase('a')").unwrap(), "A");
    }
}

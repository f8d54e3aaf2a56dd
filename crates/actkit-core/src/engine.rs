//! Execution engine: input defaulting, validation, security checks and
//! handler invocation behind a single async result

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

use crate::action::{Action, Output};
use crate::context::Context;
use crate::error::ActionError;
use crate::schema::is_open_object_schema;
use crate::validation::{errors_text, InputValidator};

impl Action {
    /// Run the handler for `input` under `context`.
    ///
    /// Validation and security failures are reported before the handler is
    /// invoked. Handler errors and panics come back as [`ActionError`]s.
    pub async fn run(
        &self,
        input: Option<JsonValue>,
        context: Option<Context>,
    ) -> Result<Output, ActionError> {
        let input = self.preflight(input, context.as_ref())?;
        let context = context.unwrap_or_default();

        debug!(action_id = %self.id, execution_id = %context.execution_id, "running action");

        let handler = Arc::clone(&self.handler);
        let outcome = AssertUnwindSafe(async move { handler.call(input, context).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(Some(output))) => Ok(output),
            Ok(Ok(None)) => Err(ActionError::ContractViolation { action_id: self.id.clone() }),
            Ok(Err(source)) => Err(ActionError::Handler { action_id: self.id.clone(), source }),
            Err(panic) => Err(ActionError::HandlerPanicked {
                action_id: self.id.clone(),
                message: panic_message(panic.as_ref()),
            }),
        }
    }

    /// Everything `run` does before invoking the handler: input defaulting,
    /// validation and the security check. Returns the input the handler
    /// would receive.
    pub fn preflight(
        &self,
        input: Option<JsonValue>,
        context: Option<&Context>,
    ) -> Result<JsonValue, ActionError> {
        let input = self.normalize_input(input);
        self.validate_input(&input)?;
        match context {
            Some(context) => self.check_security_inner(context, true)?,
            None => self.check_security_inner(&Context::default(), false)?,
        }
        Ok(input)
    }

    /// Validate `input` against the input schema, compiling it on first use.
    pub fn validate_input(&self, input: &JsonValue) -> Result<(), ActionError> {
        let validator = self.validator()?;
        validator.validate(input).map_err(|violations| {
            debug!(action_id = %self.id, violations = violations.len(), "input rejected");
            ActionError::Validation { message: errors_text(&violations), violations }
        })
    }

    /// Check every non-optional security requirement against `context`,
    /// in declaration order.
    pub fn check_security(&self, context: &Context) -> Result<(), ActionError> {
        self.check_security_inner(context, true)
    }

    fn check_security_inner(
        &self,
        context: &Context,
        context_supplied: bool,
    ) -> Result<(), ActionError> {
        let missing = self
            .security
            .iter()
            .find(|(key, requirement)| !requirement.optional && !context.has_account(key));

        match missing {
            Some((key, _)) => Err(ActionError::MissingCredential {
                account: key.clone(),
                action_id: self.id.clone(),
                context_supplied,
            }),
            None => Ok(()),
        }
    }

    /// Apply the input defaulting rules, in order:
    /// absent → null; null with named inputs → `{}`;
    /// null with an open object schema → `{}`.
    pub(crate) fn normalize_input(&self, input: Option<JsonValue>) -> JsonValue {
        let mut input = input.unwrap_or(JsonValue::Null);
        if self.inputs.is_some() && input.is_null() {
            input = JsonValue::Object(Map::new());
        }
        if input.is_null() && is_open_object_schema(&self.input_schema) {
            input = JsonValue::Object(Map::new());
        }
        input
    }

    fn validator(&self) -> Result<&Arc<dyn InputValidator>, ActionError> {
        self.validator.get_or_try_init(|| {
            debug!(action_id = %self.id, "compiling input schema");
            self.compiler.compile(&self.input_schema).map_err(|source| {
                ActionError::InvalidSchema { action_id: self.id.clone(), source }
            })
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{handler_fn, Handler, HandlerResult, SecurityRequirement};
    use crate::error::SchemaError;
    use crate::response::Response;
    use crate::schema::InputParam;
    use crate::validation::{JsonSchemaCompiler, SchemaCompiler};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records every input it sees and echoes it back
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<JsonValue>>,
    }

    impl Recorder {
        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }

        fn last(&self) -> JsonValue {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Handler for Recorder {
        async fn call(&self, input: JsonValue, _context: Context) -> HandlerResult {
            self.seen.lock().unwrap().push(input.clone());
            Ok(Some(Output::Value(input)))
        }
    }

    /// Counts compilations and delegates to the jsonschema compiler
    #[derive(Default)]
    struct CountingCompiler {
        compiled: AtomicUsize,
    }

    impl SchemaCompiler for CountingCompiler {
        fn compile(&self, schema: &JsonValue) -> Result<Arc<dyn InputValidator>, SchemaError> {
            self.compiled.fetch_add(1, Ordering::SeqCst);
            JsonSchemaCompiler::new().compile(schema)
        }
    }

    struct Panicking;

    #[async_trait]
    impl Handler for Panicking {
        async fn call(&self, _input: JsonValue, _context: Context) -> HandlerResult {
            panic!("boom")
        }
    }

    fn doubling_action() -> Action {
        Action::builder()
            .id("double")
            .inputs(vec![InputParam::required("x", json!({"type": "number"}))])
            .handler(handler_fn(|input: JsonValue, _ctx| async move {
                let x = input["x"].as_f64().unwrap_or_default();
                Ok(Some(Output::Value(json!(x * 2.0))))
            }))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn named_inputs_validate_and_invoke() {
        let action = doubling_action();

        let output = action.run(Some(json!({"x": 3})), None).await.unwrap();
        assert_eq!(output.into_value().unwrap().as_f64(), Some(6.0));

        let err = action.run(Some(json!({})), None).await.unwrap_err();
        assert_eq!(err.status_code(), Some(400));

        let err = action.run(None, None).await.unwrap_err();
        assert!(matches!(err, ActionError::Validation { .. }));
    }

    #[tokio::test]
    async fn schemaless_action_defaults_to_null() {
        let recorder = Arc::new(Recorder::default());
        let action = Action::builder().handler(recorder.clone()).build().unwrap();

        action.run(None, None).await.unwrap();
        assert_eq!(recorder.last(), JsonValue::Null);
    }

    #[tokio::test]
    async fn open_object_schema_defaults_to_empty_object() {
        let recorder = Arc::new(Recorder::default());
        let action = Action::builder()
            .input_schema(json!({"type": "object", "properties": {"q": {"type": "string"}}}))
            .handler(recorder.clone())
            .build()
            .unwrap();

        action.run(None, None).await.unwrap();
        assert_eq!(recorder.last(), json!({}));

        action.run(Some(JsonValue::Null), None).await.unwrap();
        assert_eq!(recorder.last(), json!({}));
    }

    #[tokio::test]
    async fn optional_named_inputs_default_to_empty_object() {
        let recorder = Arc::new(Recorder::default());
        let action = Action::builder()
            .inputs(vec![InputParam::new("q", json!({"type": "string"}))])
            .handler(recorder.clone())
            .build()
            .unwrap();

        action.run(None, None).await.unwrap();
        assert_eq!(recorder.last(), json!({}));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_handler() {
        let recorder = Arc::new(Recorder::default());
        let action = Action::builder()
            .input_schema(json!({"type": "object", "required": ["name"]}))
            .handler(recorder.clone())
            .build()
            .unwrap();

        for input in [None, Some(json!({})), Some(json!("name")), Some(json!({"other": 1}))] {
            let err = action.run(input, None).await.unwrap_err();
            assert!(matches!(err, ActionError::Validation { .. }));
        }
        assert_eq!(recorder.calls(), 0);

        let err = action.run(Some(json!({"name": 5, "x": 1})), None).await;
        assert!(err.is_ok());
        assert_eq!(recorder.calls(), 1);
    }

    #[tokio::test]
    async fn validation_message_aggregates_violations() {
        let action = Action::builder()
            .input_schema(json!({
                "type": "object",
                "properties": {"a": {"type": "string"}, "b": {"type": "integer"}}
            }))
            .build()
            .unwrap();

        match action.run(Some(json!({"a": 1, "b": "x"})), None).await {
            Err(ActionError::Validation { message, violations }) => {
                assert_eq!(violations.len(), 2);
                assert!(message.contains("input/a"));
                assert!(message.contains("input/b"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_required_account_is_reported() {
        let recorder = Arc::new(Recorder::default());
        let action = Action::builder()
            .id("repos.list")
            .security("github", SecurityRequirement::required())
            .handler(recorder.clone())
            .build()
            .unwrap();

        match action.run(None, None).await {
            Err(ActionError::MissingCredential { account, action_id, context_supplied }) => {
                assert_eq!(account, "github");
                assert_eq!(action_id, "repos.list");
                assert!(!context_supplied);
            }
            other => panic!("expected missing credential, got {other:?}"),
        }

        let err = action.run(None, Some(Context::new())).await.unwrap_err();
        assert!(matches!(err, ActionError::MissingCredential { context_supplied: true, .. }));
        assert_eq!(recorder.calls(), 0);

        let ctx = Context::new().with_account("github", json!({}));
        assert!(action.run(None, Some(ctx)).await.is_ok());
        assert_eq!(recorder.calls(), 1);
    }

    #[tokio::test]
    async fn security_reports_first_missing_in_declaration_order() {
        let action = Action::builder()
            .security("zeta", SecurityRequirement::required())
            .security("alpha", SecurityRequirement::required())
            .security("beta", SecurityRequirement::optional())
            .build()
            .unwrap();

        let err = action.check_security(&Context::new()).unwrap_err();
        assert!(matches!(err, ActionError::MissingCredential { ref account, .. } if account == "zeta"));

        let ctx = Context::new().with_account("zeta", json!({}));
        let err = action.check_security(&ctx).unwrap_err();
        assert!(matches!(err, ActionError::MissingCredential { ref account, .. } if account == "alpha"));

        let ctx = ctx.with_account("alpha", json!({"key": "k"}));
        assert!(action.check_security(&ctx).is_ok());
    }

    #[tokio::test]
    async fn validation_runs_before_security() {
        let action = Action::builder()
            .input_schema(json!({"type": "string"}))
            .security("github", SecurityRequirement::required())
            .build()
            .unwrap();

        let err = action.run(Some(json!(1)), None).await.unwrap_err();
        assert!(matches!(err, ActionError::Validation { .. }));
    }

    #[tokio::test]
    async fn absent_handler_result_is_a_contract_violation() {
        let action = Action::builder()
            .id("silent")
            .handler(handler_fn(|_input, _ctx| async { HandlerResult::Ok(None) }))
            .build()
            .unwrap();

        let err = action.run(None, None).await.unwrap_err();
        assert!(matches!(err, ActionError::ContractViolation { ref action_id } if action_id == "silent"));
    }

    #[tokio::test]
    async fn explicit_null_and_responses_pass_through() {
        let action = Action::builder().build().unwrap();
        assert_eq!(action.run(None, None).await.unwrap(), Output::null());

        let action = Action::builder()
            .handler(handler_fn(|_input, _ctx| async {
                Ok(Some(Response::new(201).with_body(json!({"id": 7})).into()))
            }))
            .build()
            .unwrap();
        let output = action.run(None, None).await.unwrap();
        let response = output.as_response().unwrap();
        assert_eq!(response.status_code, 201);
        assert_eq!(response.body["id"], 7);
    }

    #[tokio::test]
    async fn handler_errors_and_panics_surface_as_results() {
        let failing = Action::builder()
            .id("failing")
            .handler(handler_fn(|_input, _ctx| async {
                HandlerResult::Err("upstream exploded".into())
            }))
            .build()
            .unwrap();
        let err = failing.run(None, None).await.unwrap_err();
        assert!(matches!(err, ActionError::Handler { .. }));
        assert!(err.to_string().contains("upstream exploded"));

        let panicking = Action::builder()
            .id("panicking")
            .handler(Arc::new(Panicking))
            .build()
            .unwrap();
        match panicking.run(None, None).await {
            Err(ActionError::HandlerPanicked { action_id, message }) => {
                assert_eq!(action_id, "panicking");
                assert_eq!(message, "boom");
            }
            other => panic!("expected panic to be captured, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn handler_receives_the_callers_context() {
        let action = Action::builder()
            .handler(handler_fn(|_input, ctx: Context| async move {
                Ok(Some(Output::Value(json!(ctx.execution_id))))
            }))
            .build()
            .unwrap();

        let output = action.run(None, Some(Context::with_id("run-42"))).await.unwrap();
        assert_eq!(output.into_value().unwrap(), json!("run-42"));
    }

    #[tokio::test]
    async fn validator_is_compiled_once() {
        let compiler = Arc::new(CountingCompiler::default());
        let action = Action::builder()
            .input_schema(json!({"type": "object"}))
            .compiler(compiler.clone())
            .build()
            .unwrap();

        assert!(!action.is_compiled());
        for _ in 0..3 {
            action.run(None, None).await.unwrap();
        }
        assert!(action.is_compiled());
        assert_eq!(compiler.compiled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_runs_share_one_validator() {
        let compiler = Arc::new(CountingCompiler::default());
        let action = Arc::new(
            Action::builder()
                .inputs(vec![InputParam::required("n", json!({"type": "integer"}))])
                .compiler(compiler.clone())
                .build()
                .unwrap(),
        );

        let mut tasks = Vec::new();
        for i in 0..16 {
            let action = Arc::clone(&action);
            tasks.push(tokio::spawn(async move {
                let input = if i % 2 == 0 { json!({"n": i}) } else { json!({"n": "bad"}) };
                action.run(Some(input), None).await.is_ok()
            }));
        }

        for (i, task) in tasks.into_iter().enumerate() {
            assert_eq!(task.await.unwrap(), i % 2 == 0);
        }
        assert_eq!(compiler.compiled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn broken_schema_surfaces_on_run_and_is_not_cached() {
        let action = Action::builder().input_schema(json!({"type": 12})).build().unwrap();

        for _ in 0..2 {
            let err = action.run(None, None).await.unwrap_err();
            assert!(matches!(err, ActionError::InvalidSchema { .. }));
        }
        assert!(!action.is_compiled());
    }

    #[test]
    fn preflight_checks_without_invoking() {
        let recorder = Arc::new(Recorder::default());
        let action = Action::builder()
            .id("guarded")
            .inputs(vec![InputParam::new("q", json!({"type": "string"}))])
            .security("github", SecurityRequirement::required())
            .handler(recorder.clone())
            .build()
            .unwrap();

        let err = action.preflight(None, None).unwrap_err();
        assert!(matches!(err, ActionError::MissingCredential { context_supplied: false, .. }));

        let ctx = Context::new().with_account("github", json!({}));
        assert_eq!(action.preflight(None, Some(&ctx)).unwrap(), json!({}));

        let err = action.preflight(Some(json!({"q": 1})), Some(&ctx)).unwrap_err();
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(recorder.calls(), 0);
    }
}

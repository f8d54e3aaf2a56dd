//! The Action entity: identity, schemas, security requirements and handler

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::context::Context;
use crate::error::{BoxError, CoreResult};
use crate::response::Response;
use crate::schema::{derive_schema, InputParam};
use crate::validation::{default_compiler, InputValidator, SchemaCompiler};

/// Id given to actions constructed without one.
pub const ANONYMOUS_ACTION_ID: &str = "anonymous";

/// Successful result of a handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Value(JsonValue),
    Response(Response),
}

impl Output {
    pub fn null() -> Self {
        Self::Value(JsonValue::Null)
    }

    pub fn as_value(&self) -> Option<&JsonValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&Response> {
        match self {
            Self::Response(response) => Some(response),
            Self::Value(_) => None,
        }
    }

    pub fn into_value(self) -> Option<JsonValue> {
        match self {
            Self::Value(value) => Some(value),
            Self::Response(_) => None,
        }
    }
}

impl From<JsonValue> for Output {
    fn from(value: JsonValue) -> Self {
        Self::Value(value)
    }
}

impl From<Response> for Output {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

/// What a handler resolves to. `Ok(None)` means the handler produced nothing,
/// which the engine reports as a contract violation.
pub type HandlerResult = Result<Option<Output>, BoxError>;

/// Invocable behavior behind an action
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, input: JsonValue, context: Context) -> HandlerResult;
}

/// Handler used when none is supplied; always resolves to `null`.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHandler;

#[async_trait]
impl Handler for NullHandler {
    async fn call(&self, _input: JsonValue, _context: Context) -> HandlerResult {
        Ok(Some(Output::null()))
    }
}

/// Adapter turning an async closure into a [`Handler`].
pub struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(JsonValue, Context) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send,
{
    async fn call(&self, input: JsonValue, context: Context) -> HandlerResult {
        (self.0)(input, context).await
    }
}

/// Wrap an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(JsonValue, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// A declared credential dependency.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SecurityRequirement {
    #[serde(default)]
    pub optional: bool,
    /// Remaining descriptor fields (type, scopes, ...), carried as metadata
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl SecurityRequirement {
    pub fn required() -> Self {
        Self::default()
    }

    pub fn optional() -> Self {
        Self { optional: true, ..Self::default() }
    }
}

/// Serializable raw form of an action, as found in module files and
/// integration manifests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "input_schema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<InputParam>>,
    #[serde(default, alias = "output_schema", skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<JsonValue>,
    /// `null` entries carry no requirement
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub security: IndexMap<String, Option<SecurityRequirement>>,
    /// Name of a host-registered handler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
}

/// A named, schema-validated, security-gated unit of invocable behavior.
///
/// Immutable once built, except for the compiled input validator, which is
/// materialized on first use and kept for the action's lifetime.
pub struct Action {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) input_schema: JsonValue,
    pub(crate) inputs: Option<Vec<InputParam>>,
    pub(crate) output_schema: JsonValue,
    pub(crate) security: IndexMap<String, SecurityRequirement>,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) compiler: Arc<dyn SchemaCompiler>,
    pub(crate) validator: OnceCell<Arc<dyn InputValidator>>,
}

impl Action {
    pub fn builder() -> ActionBuilder {
        ActionBuilder::default()
    }

    /// Build an action from a raw descriptor with the default handler.
    pub fn from_descriptor(descriptor: ActionDescriptor) -> CoreResult<Self> {
        ActionBuilder::from(descriptor).build()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The effective input schema; derived from `inputs` when those were given.
    pub fn input_schema(&self) -> &JsonValue {
        &self.input_schema
    }

    pub fn inputs(&self) -> Option<&[InputParam]> {
        self.inputs.as_deref()
    }

    pub fn output_schema(&self) -> &JsonValue {
        &self.output_schema
    }

    pub fn security(&self) -> &IndexMap<String, SecurityRequirement> {
        &self.security
    }

    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Whether the input validator has been compiled yet.
    pub fn is_compiled(&self) -> bool {
        self.validator.get().is_some()
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("input_schema", &self.input_schema)
            .field("security", &self.security.keys().collect::<Vec<_>>())
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

/// Builder for [`Action`]
#[derive(Default)]
pub struct ActionBuilder {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    input_schema: Option<JsonValue>,
    inputs: Option<Vec<InputParam>>,
    output_schema: Option<JsonValue>,
    security: IndexMap<String, SecurityRequirement>,
    handler: Option<Arc<dyn Handler>>,
    compiler: Option<Arc<dyn SchemaCompiler>>,
}

impl ActionBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Explicit input schema. Ignored when `inputs` are also given.
    pub fn input_schema(mut self, schema: JsonValue) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn inputs(mut self, inputs: Vec<InputParam>) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn output_schema(mut self, schema: JsonValue) -> Self {
        self.output_schema = Some(schema);
        self
    }

    pub fn security(mut self, key: impl Into<String>, requirement: SecurityRequirement) -> Self {
        self.security.insert(key.into(), requirement);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Use a specific validation engine instead of the process-wide default
    pub fn compiler(mut self, compiler: Arc<dyn SchemaCompiler>) -> Self {
        self.compiler = Some(compiler);
        self
    }

    pub fn build(self) -> CoreResult<Action> {
        let input_schema = match &self.inputs {
            Some(inputs) => derive_schema(inputs)?,
            None => self.input_schema.unwrap_or_else(|| JsonValue::Object(Map::new())),
        };

        Ok(Action {
            id: self.id.unwrap_or_else(|| ANONYMOUS_ACTION_ID.to_string()),
            title: self.title.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            input_schema,
            inputs: self.inputs,
            output_schema: self.output_schema.unwrap_or_else(|| JsonValue::Object(Map::new())),
            security: self.security,
            handler: self.handler.unwrap_or_else(|| Arc::new(NullHandler)),
            compiler: self.compiler.unwrap_or_else(default_compiler),
            validator: OnceCell::new(),
        })
    }
}

impl From<ActionDescriptor> for ActionBuilder {
    fn from(descriptor: ActionDescriptor) -> Self {
        Self {
            id: descriptor.id,
            title: descriptor.title,
            description: descriptor.description,
            input_schema: descriptor.input_schema,
            inputs: descriptor.inputs,
            output_schema: descriptor.output_schema,
            security: descriptor
                .security
                .into_iter()
                .filter_map(|(key, requirement)| requirement.map(|r| (key, r)))
                .collect(),
            handler: None,
            compiler: None,
        }
    }
}

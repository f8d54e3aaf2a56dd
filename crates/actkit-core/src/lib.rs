pub mod action;
pub mod context;
pub mod engine;
pub mod error;
pub mod response;
pub mod schema;
pub mod validation;

// Re-export commonly used types
pub use action::{
    handler_fn, Action, ActionBuilder, ActionDescriptor, FnHandler, Handler, HandlerResult,
    NullHandler, Output, SecurityRequirement, ANONYMOUS_ACTION_ID,
};
pub use context::Context;
pub use error::{ActionError, BoxError, CoreError, CoreResult, SchemaError};
pub use response::Response;
pub use schema::{derive_schema, InputParam};
pub use validation::{
    default_compiler, errors_text, InputValidator, JsonSchemaCompiler, SchemaCompiler, Violation,
};

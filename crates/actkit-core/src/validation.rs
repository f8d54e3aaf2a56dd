//! Schema validation engine: compiles JSON Schema documents into reusable validators

use std::fmt;
use std::sync::Arc;

use jsonschema::{Draft, JSONSchema};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::SchemaError;

/// One schema violation reported by a validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer to the offending part of the input, empty for the root.
    pub instance_path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "input{}: {}", self.instance_path, self.message)
    }
}

/// Render every violation into one human-readable line.
pub fn errors_text(violations: &[Violation]) -> String {
    if violations.is_empty() {
        return "input does not match schema".to_string();
    }
    violations.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

/// A compiled input schema.
pub trait InputValidator: Send + Sync {
    fn validate(&self, input: &JsonValue) -> Result<(), Vec<Violation>>;
}

/// Compiles schema documents into validators.
pub trait SchemaCompiler: Send + Sync {
    fn compile(&self, schema: &JsonValue) -> Result<Arc<dyn InputValidator>, SchemaError>;
}

/// [`SchemaCompiler`] backed by the `jsonschema` crate.
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaCompiler {
    draft: Option<Draft>,
}

impl JsonSchemaCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the draft instead of detecting it from `$schema`
    pub fn with_draft(mut self, draft: Draft) -> Self {
        self.draft = Some(draft);
        self
    }
}

impl SchemaCompiler for JsonSchemaCompiler {
    fn compile(&self, schema: &JsonValue) -> Result<Arc<dyn InputValidator>, SchemaError> {
        let mut options = JSONSchema::options();
        if let Some(draft) = self.draft {
            options.with_draft(draft);
        }
        let compiled = options.compile(schema).map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Arc::new(CompiledSchema(compiled)))
    }
}

struct CompiledSchema(JSONSchema);

impl InputValidator for CompiledSchema {
    fn validate(&self, input: &JsonValue) -> Result<(), Vec<Violation>> {
        self.0.validate(input).map_err(|errors| {
            errors
                .map(|error| Violation {
                    instance_path: error.instance_path.to_string(),
                    message: error.to_string(),
                })
                .collect()
        })
    }
}

static DEFAULT_COMPILER: Lazy<Arc<dyn SchemaCompiler>> =
    Lazy::new(|| Arc::new(JsonSchemaCompiler::new()));

/// Process-wide compiler used by actions that don't bring their own.
pub fn default_compiler() -> Arc<dyn SchemaCompiler> {
    DEFAULT_COMPILER.clone()
}

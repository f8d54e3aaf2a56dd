//! Derivation of an object input schema from an ordered list of named inputs

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::SchemaError;

fn empty_schema() -> JsonValue {
    JsonValue::Object(Map::new())
}

/// A single named parameter of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputParam {
    pub name: String,
    #[serde(default = "empty_schema")]
    pub schema: JsonValue,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
}

impl InputParam {
    /// Create an optional parameter with the given schema
    pub fn new(name: impl Into<String>, schema: JsonValue) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
            title: None,
            description: None,
            default: None,
        }
    }

    /// Create a required parameter with the given schema
    pub fn required(name: impl Into<String>, schema: JsonValue) -> Self {
        Self { required: true, ..Self::new(name, schema) }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Property schema for this parameter, with the descriptive fields merged
    /// in where the schema does not already define them.
    fn property_schema(&self) -> Result<JsonValue, SchemaError> {
        match &self.schema {
            JsonValue::Object(map) => {
                let mut property = map.clone();
                let extras = [
                    ("title", self.title.clone().map(JsonValue::String)),
                    ("description", self.description.clone().map(JsonValue::String)),
                    ("default", self.default.clone()),
                ];
                for (key, value) in extras {
                    if let Some(value) = value {
                        property.entry(key).or_insert(value);
                    }
                }
                Ok(JsonValue::Object(property))
            }
            JsonValue::Bool(_) => Ok(self.schema.clone()),
            other => Err(SchemaError::InvalidParamSchema {
                name: self.name.clone(),
                kind: json_kind(other),
            }),
        }
    }
}

/// Build the canonical `type: object` schema for a list of named inputs.
///
/// Properties keep declaration order. Inputs flagged `required` are listed
/// under `required`; the key is omitted when no input is required.
pub fn derive_schema(inputs: &[InputParam]) -> Result<JsonValue, SchemaError> {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for (position, input) in inputs.iter().enumerate() {
        if input.name.trim().is_empty() {
            return Err(SchemaError::EmptyName(position));
        }
        if properties.contains_key(&input.name) {
            return Err(SchemaError::DuplicateName(input.name.clone()));
        }
        let property = input.property_schema()?;
        if input.required {
            required.push(JsonValue::String(input.name.clone()));
        }
        properties.insert(input.name.clone(), property);
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), JsonValue::String("object".to_string()));
    schema.insert("properties".to_string(), JsonValue::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), JsonValue::Array(required));
    }
    Ok(JsonValue::Object(schema))
}

/// True when `schema` is `type: object` and declares no required properties.
pub(crate) fn is_open_object_schema(schema: &JsonValue) -> bool {
    if schema.get("type").and_then(JsonValue::as_str) != Some("object") {
        return false;
    }
    match schema.get("required") {
        None => true,
        Some(JsonValue::Array(names)) => names.is_empty(),
        Some(_) => false,
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Wrapper a handler may return when it needs control over status and headers.
///
/// The engine passes it through untouched; unwrapping is left to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status_code: u16,
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub body: JsonValue,
    #[serde(default = "default_encoding")]
    pub encoding: String,
}

fn default_encoding() -> String {
    "utf8".to_string()
}

impl Response {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: IndexMap::new(),
            body: JsonValue::Null,
            encoding: default_encoding(),
        }
    }

    /// 200 response with a JSON body
    pub fn json(body: JsonValue) -> Self {
        Self::new(200).with_header("Content-Type", "application/json").with_body(body)
    }

    /// 200 response with a plain-text body
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(200)
            .with_header("Content-Type", "text/plain")
            .with_body(JsonValue::String(body.into()))
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = body;
        self
    }

    pub fn with_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.encoding = encoding.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(200)
    }
}

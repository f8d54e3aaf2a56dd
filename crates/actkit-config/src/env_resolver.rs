//! `${VAR}` / `${VAR:default}` substitution in configuration values

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::env;
use thiserror::Error;

static VAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{([^}:]+)(?::([^}]*))?\}").expect("variable pattern is a valid regex")
});

#[derive(Debug, Error)]
pub enum EnvResolverError {
    #[error("Environment variable '{0}' not found and no default provided")]
    VarNotFound(String),
    #[error("Environment variable '{0}' is not in whitelist. Allowed prefixes: {1:?}")]
    VarNotWhitelisted(String, Vec<String>),
}

/// Environment variable resolver with a prefix whitelist
#[derive(Debug, Clone)]
pub struct EnvResolver {
    /// Allowed prefixes for variable names. Empty means no restrictions
    allowed_prefixes: Vec<String>,
}

impl Default for EnvResolver {
    fn default() -> Self {
        Self { allowed_prefixes: vec!["ACTKIT_".to_string()] }
    }
}

impl EnvResolver {
    pub fn new(allowed_prefixes: Vec<String>) -> Self {
        Self { allowed_prefixes }
    }

    /// Resolver that allows every variable
    pub fn unrestricted() -> Self {
        Self { allowed_prefixes: vec![] }
    }

    pub fn allowed_prefixes(&self) -> &[String] {
        &self.allowed_prefixes
    }

    /// Resolve variables in every string of `value`.
    ///
    /// A string that is exactly one reference is re-typed from the substituted
    /// text (bool, integer, float, JSON object/array); strings mixing text and
    /// references stay strings.
    pub fn resolve(&self, value: &JsonValue) -> Result<JsonValue, EnvResolverError> {
        match value {
            JsonValue::String(s) => self.resolve_string(s),
            JsonValue::Object(obj) => {
                let mut resolved = serde_json::Map::with_capacity(obj.len());
                for (key, val) in obj {
                    resolved.insert(key.clone(), self.resolve(val)?);
                }
                Ok(JsonValue::Object(resolved))
            }
            JsonValue::Array(items) => items
                .iter()
                .map(|item| self.resolve(item))
                .collect::<Result<Vec<_>, _>>()
                .map(JsonValue::Array),
            other => Ok(other.clone()),
        }
    }

    fn resolve_string(&self, input: &str) -> Result<JsonValue, EnvResolverError> {
        if !input.contains("${") {
            return Ok(JsonValue::String(input.to_string()));
        }

        let whole_reference = VAR_PATTERN
            .find(input)
            .map(|m| m.start() == 0 && m.end() == input.len())
            .unwrap_or(false);

        let mut result = String::with_capacity(input.len());
        let mut last = 0;
        for caps in VAR_PATTERN.captures_iter(input) {
            let Some(full) = caps.get(0) else { continue };
            let name = &caps[1];
            self.check_var_name(name)?;

            let value = match env::var(name) {
                Ok(value) => value,
                Err(_) => caps
                    .get(2)
                    .map(|default| default.as_str().to_string())
                    .ok_or_else(|| EnvResolverError::VarNotFound(name.to_string()))?,
            };
            result.push_str(&input[last..full.start()]);
            result.push_str(&value);
            last = full.end();
        }
        result.push_str(&input[last..]);

        if whole_reference {
            Ok(retype(result))
        } else {
            Ok(JsonValue::String(result))
        }
    }

    fn check_var_name(&self, name: &str) -> Result<(), EnvResolverError> {
        if self.allowed_prefixes.is_empty()
            || self.allowed_prefixes.iter().any(|prefix| name.starts_with(prefix.as_str()))
        {
            return Ok(());
        }
        Err(EnvResolverError::VarNotWhitelisted(name.to_string(), self.allowed_prefixes.clone()))
    }
}

fn retype(text: String) -> JsonValue {
    if text.starts_with('{') || text.starts_with('[') {
        if let Ok(parsed) = serde_json::from_str(&text) {
            return parsed;
        }
    }
    if let Ok(b) = text.parse::<bool>() {
        return JsonValue::Bool(b);
    }
    if let Ok(i) = text.parse::<i64>() {
        return JsonValue::from(i);
    }
    if let Ok(f) = text.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return JsonValue::Number(n);
        }
    }
    JsonValue::String(text)
}

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Per-invocation carrier of account state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Context {
    /// Unique execution ID for tracing
    pub execution_id: String,
    /// Account state keyed by credential name
    #[serde(default)]
    pub accounts: HashMap<String, JsonValue>,
    /// Free-form values shared with the handler
    #[serde(default)]
    pub variables: HashMap<String, JsonValue>,
}

impl Context {
    /// Create an empty context with a generated execution ID
    pub fn new() -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string())
    }

    /// Create an empty context with a custom execution ID
    pub fn with_id(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            accounts: HashMap::new(),
            variables: HashMap::new(),
        }
    }

    pub fn with_account(mut self, key: impl Into<String>, account: JsonValue) -> Self {
        self.accounts.insert(key.into(), account);
        self
    }

    pub fn with_accounts<I, K>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = (K, JsonValue)>,
        K: Into<String>,
    {
        self.accounts.extend(accounts.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.variables.insert(key.into(), value);
        self
    }

    /// Whether an account is configured for `key`. A `null` entry counts as absent.
    pub fn has_account(&self, key: &str) -> bool {
        self.account(key).is_some()
    }

    pub fn account(&self, key: &str) -> Option<&JsonValue> {
        self.accounts.get(key).filter(|account| !account.is_null())
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_accounts_are_treated_as_missing() {
        let ctx = Context::new()
            .with_account("github", json!({"token": "abc"}))
            .with_account("slack", JsonValue::Null);

        assert!(ctx.has_account("github"));
        assert!(!ctx.has_account("slack"));
        assert!(!ctx.has_account("stripe"));
        assert_eq!(ctx.account("github").unwrap()["token"], "abc");
    }

    #[test]
    fn default_contexts_get_distinct_ids() {
        let a = Context::default();
        let b = Context::default();
        assert_ne!(a.execution_id, b.execution_id);
        assert!(a.accounts.is_empty());
    }

    #[test]
    fn deserializes_with_missing_maps() {
        let ctx: Context = serde_json::from_value(json!({"execution_id": "run-1"})).unwrap();
        assert_eq!(ctx.execution_id, "run-1");
        assert!(ctx.variables.is_empty());
    }
}

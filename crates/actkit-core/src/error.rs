use thiserror::Error;

use crate::validation::Violation;

/// Boxed error type returned by handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type CoreResult<T> = Result<T, CoreError>;

/// Errors raised while turning named inputs or schemas into validators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("input at position {0} has an empty name")]
    EmptyName(usize),

    #[error("duplicate input name '{0}'")]
    DuplicateName(String),

    #[error("schema for input '{name}' must be an object or a boolean, got {kind}")]
    InvalidParamSchema { name: String, kind: &'static str },

    #[error("invalid JSON Schema: {0}")]
    Compile(String),
}

/// Construction-time errors.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("schema: {0}")]
    Schema(#[from] SchemaError),
}

/// Failures surfaced by [`Action::run`](crate::Action::run).
#[derive(Debug, Error)]
pub enum ActionError {
    /// Input rejected by the compiled input schema. The handler was not called.
    #[error("{message}")]
    Validation {
        message: String,
        violations: Vec<Violation>,
    },

    /// A non-optional security requirement has no account in the context.
    #[error(
        "Account {account} not specified for action {action_id}. Did you remember to pass in the 'context' object?"
    )]
    MissingCredential {
        account: String,
        action_id: String,
        /// False when the caller omitted the context and a default one was used.
        context_supplied: bool,
    },

    /// The action's input schema could not be compiled.
    #[error("invalid input schema for action {action_id}: {source}")]
    InvalidSchema {
        action_id: String,
        #[source]
        source: SchemaError,
    },

    /// The handler finished without producing a value, a Response, or null.
    #[error("handler for action {action_id} must return a value, a Response, or null")]
    ContractViolation { action_id: String },

    #[error("handler for action {action_id} failed: {source}")]
    Handler {
        action_id: String,
        #[source]
        source: BoxError,
    },

    #[error("handler for action {action_id} panicked: {message}")]
    HandlerPanicked { action_id: String, message: String },
}

impl ActionError {
    /// HTTP-equivalent status classification, when one applies.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Validation { .. } => Some(400),
            _ => None,
        }
    }

    /// True for failures caused by the caller rather than the action.
    pub fn is_client_fault(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::MissingCredential { .. })
    }

    pub fn action_id(&self) -> Option<&str> {
        match self {
            Self::Validation { .. } => None,
            Self::MissingCredential { action_id, .. }
            | Self::InvalidSchema { action_id, .. }
            | Self::ContractViolation { action_id }
            | Self::Handler { action_id, .. }
            | Self::HandlerPanicked { action_id, .. } => Some(action_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_classify_as_bad_request() {
        let err = ActionError::Validation { message: "input/x: bad".to_string(), violations: vec![] };
        assert_eq!(err.status_code(), Some(400));
        assert!(err.is_client_fault());
        assert_eq!(err.to_string(), "input/x: bad");
    }

    #[test]
    fn missing_credential_message_names_account_and_action() {
        let err = ActionError::MissingCredential {
            account: "github".to_string(),
            action_id: "repos.list".to_string(),
            context_supplied: false,
        };
        let msg = err.to_string();
        assert!(msg.contains("github"));
        assert!(msg.contains("repos.list"));
        assert!(msg.contains("'context'"));
        assert!(err.is_client_fault());
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn handler_faults_are_not_client_faults() {
        let err = ActionError::ContractViolation { action_id: "a".to_string() };
        assert!(!err.is_client_fault());
        assert_eq!(err.action_id(), Some("a"));
    }
}

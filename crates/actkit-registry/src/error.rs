//! Error types for name resolution

use actkit_config::ConfigError;
use actkit_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Resolution errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Could not find action {0}: expected a local path or '<integration>/<action>'")]
    NoSeparator(String),

    #[error("Integration '{name}' not found: {reason}")]
    IntegrationNotFound { name: String, reason: String },

    #[error("Action '{action}' not found in integration '{integration}'")]
    ActionNotFound { integration: String, action: String },

    #[error("Module not found: {}", .0.display())]
    ModuleNotFound(PathBuf),

    #[error("Invalid module {}: {reason}", path.display())]
    InvalidModule { path: PathBuf, reason: String },

    #[error("Invalid integration '{name}': {reason}")]
    InvalidIntegration { name: String, reason: String },

    #[error("Handler '{handler}' referenced by {origin} is not registered")]
    HandlerNotFound { origin: String, handler: String },

    #[error("Invalid action definition: {0}")]
    Core(#[from] CoreError),
}

impl RegistryError {
    /// Whether the name was well-formed but nothing answered to it
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::IntegrationNotFound { .. } | Self::ActionNotFound { .. } | Self::ModuleNotFound(_)
        )
    }

    pub(crate) fn invalid_module(path: impl Into<PathBuf>, err: ConfigError) -> Self {
        Self::InvalidModule { path: path.into(), reason: err.to_string() }
    }
}

/// Registry result type
pub type RegistryResult<T> = Result<T, RegistryError>;

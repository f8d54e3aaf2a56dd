use actkit_config::ConfigError;
use actkit_core::ActionError;
use actkit_registry::RegistryError;
use thiserror::Error;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Resolution error: {0}")]
    Resolution(#[from] RegistryError),

    #[error(transparent)]
    Action(#[from] ActionError),
}

impl RuntimeError {
    /// HTTP-style status for errors that carry one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Action(err) => err.status_code(),
            Self::Resolution(err) if err.is_not_found() => Some(404),
            _ => None,
        }
    }

    pub fn action_error(&self) -> Option<&ActionError> {
        match self {
            Self::Action(err) => Some(err),
            _ => None,
        }
    }
}

pub mod env_resolver;
pub mod error;
pub mod loader;
pub mod project;

// Re-export commonly used types
pub use env_resolver::{EnvResolver, EnvResolverError};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_document, parse_document, FileFormat};
pub use project::ProjectConfig;

use crate::env_resolver::EnvResolver;
use crate::error::{ConfigError, ConfigResult};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FileFormat {
    /// Detect file format from extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => Ok(FileFormat::Yaml),
            Some("json") => Ok(FileFormat::Json),
            Some(ext) => Err(ConfigError::UnsupportedFormat(ext.to_string())),
            None => Err(ConfigError::UnsupportedFormat("no extension".to_string())),
        }
    }

    /// Extensions tried, in order, when a path is given without one
    pub fn extensions() -> &'static [&'static str] {
        &["yml", "yaml", "json"]
    }
}

/// Parse document content and resolve environment references in it
pub fn parse_document(
    content: &str,
    format: FileFormat,
    env: &EnvResolver,
) -> ConfigResult<JsonValue> {
    let raw: JsonValue = match format {
        FileFormat::Yaml => serde_yaml::from_str(content)?,
        FileFormat::Json => serde_json::from_str(content)?,
    };
    Ok(env.resolve(&raw)?)
}

/// Read a YAML or JSON document from disk
pub fn load_document<P: AsRef<Path>>(path: P, env: &EnvResolver) -> ConfigResult<JsonValue> {
    let path = path.as_ref();
    let format = FileFormat::from_path(path)?;
    let content = fs::read_to_string(path)?;
    tracing::debug!(path = %path.display(), ?format, "loading document");
    parse_document(&content, format, env)
}

//! Project-level configuration: where local actions and integrations live,
//! and which accounts are available to actions

use actkit_core::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

use crate::env_resolver::EnvResolver;
use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_document;

fn default_env_prefixes() -> Vec<String> {
    vec!["ACTKIT_".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory local action names are resolved against
    #[serde(default)]
    pub base_directory: PathBuf,
    /// Roots searched for integration manifests, in order
    #[serde(default)]
    pub integration_paths: Vec<PathBuf>,
    /// Account state keyed by credential name
    #[serde(default)]
    pub accounts: IndexMap<String, JsonValue>,
    /// Prefixes environment references in config and module files may use;
    /// an empty list allows every variable
    #[serde(default = "default_env_prefixes")]
    pub env_prefixes: Vec<String>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            base_directory: PathBuf::from("."),
            integration_paths: Vec::new(),
            accounts: IndexMap::new(),
            env_prefixes: default_env_prefixes(),
        }
    }
}

impl ProjectConfig {
    /// Load a project file. Relative paths inside it are taken relative to
    /// the file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        // The whitelist itself lives in the file, so read it with the default one.
        let document = load_document(path, &EnvResolver::default())?;
        let mut config: ProjectConfig = serde_json::from_value(document)?;

        let root = path.parent().unwrap_or_else(|| Path::new("."));
        config.base_directory = anchor(root, &config.base_directory);
        config.integration_paths =
            config.integration_paths.iter().map(|p| anchor(root, p)).collect();
        config.validate()?;

        tracing::debug!(
            path = %path.display(),
            base_directory = %config.base_directory.display(),
            integrations = config.integration_paths.len(),
            accounts = config.accounts.len(),
            "loaded project config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(key) = self.accounts.keys().find(|key| key.trim().is_empty()) {
            return Err(ConfigError::Validation(format!("invalid account name '{key}'")));
        }
        Ok(())
    }

    pub fn env_resolver(&self) -> EnvResolver {
        EnvResolver::new(self.env_prefixes.clone())
    }

    /// A fresh context carrying the configured accounts
    pub fn context(&self) -> Context {
        Context::new().with_accounts(self.accounts.clone())
    }
}

fn anchor(root: &Path, path: &Path) -> PathBuf {
    if path.as_os_str().is_empty() {
        root.to_path_buf()
    } else if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

//! Project runtime: resolves action names and executes them with the
//! project's accounts

use actkit_config::ProjectConfig;
use actkit_core::{Action, Context};
use actkit_registry::{
    DirectoryCatalog, FsModuleLoader, HandlerTable, Integration, IntegrationMap, ModuleCache,
    NameResolver,
};
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::RuntimeResult;
use crate::execution::{execute_action, ExecutionOptions, ExecutionResult};

pub struct Runtime {
    resolver: NameResolver,
    base_directory: PathBuf,
    integrations: IntegrationMap,
    accounts: IndexMap<String, JsonValue>,
}

impl Runtime {
    pub fn new(resolver: NameResolver, base_directory: impl Into<PathBuf>) -> Self {
        Self {
            resolver,
            base_directory: base_directory.into(),
            integrations: IntegrationMap::new(),
            accounts: IndexMap::new(),
        }
    }

    /// Build a runtime that loads local modules from the project's base
    /// directory and integrations from its integration paths. `handlers`
    /// backs every handler name those files reference.
    ///
    /// Loaded modules are bound to `handlers`, so each runtime keeps its own
    /// module cache.
    pub fn from_config(config: &ProjectConfig, handlers: HandlerTable) -> Self {
        let env = config.env_resolver();
        let loader = FsModuleLoader::new()
            .with_handlers(handlers.clone())
            .with_env_resolver(env.clone());
        let catalog = DirectoryCatalog::new(config.integration_paths.iter().cloned())
            .with_handlers(handlers)
            .with_env_resolver(env);

        let resolver = NameResolver::new(Arc::new(loader), Arc::new(catalog))
            .with_cache(Arc::new(ModuleCache::new()));
        let mut runtime = Self::new(resolver, config.base_directory.clone());
        runtime.accounts = config.accounts.clone();
        runtime
    }

    /// Load a project file and build a runtime from it
    pub fn load<P: AsRef<Path>>(path: P, handlers: HandlerTable) -> RuntimeResult<Self> {
        let config = ProjectConfig::load(path)?;
        Ok(Self::from_config(&config, handlers))
    }

    /// Supply an integration directly; it takes precedence over the catalog
    pub fn with_integration(mut self, name: impl Into<String>, integration: Arc<dyn Integration>) -> Self {
        self.integrations.insert(name.into(), integration);
        self
    }

    pub fn with_account(mut self, key: impl Into<String>, account: JsonValue) -> Self {
        self.accounts.insert(key.into(), account);
        self
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// A fresh context carrying the runtime's accounts
    pub fn context(&self) -> Context {
        Context::new().with_accounts(self.accounts.clone())
    }

    pub fn resolve(&self, name: &str) -> RuntimeResult<Arc<Action>> {
        Ok(self.resolver.resolve(name, &self.base_directory, &self.integrations)?)
    }

    /// Resolve `name` and run it.
    pub async fn execute(
        &self,
        name: &str,
        input: Option<JsonValue>,
        options: ExecutionOptions,
    ) -> RuntimeResult<ExecutionResult> {
        let action = self.resolve(name).map_err(|e| {
            tracing::error!(action = %name, error = %e, "Action resolution failed");
            e
        })?;
        let context = options.context.unwrap_or_else(|| self.context());
        execute_action(&action, input, context, options.dry_run).await
    }
}

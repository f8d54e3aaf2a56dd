//! Action name resolution.
//!
//! Names starting with `/` or `./` are local modules under a base directory.
//! Everything else is `<integration>/<action>`: the integration is taken from
//! the caller's map when present, otherwise from the catalog.

use actkit_core::Action;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::catalog::{EmptyCatalog, IntegrationCatalog};
use crate::error::{RegistryError, RegistryResult};
use crate::integration::{Integration, IntegrationMap};
use crate::module::{normalize_path, FsModuleLoader, ModuleCache, ModuleLoader};

/// Whether `name` refers to a local module
pub fn is_local_name(name: &str) -> bool {
    name.starts_with('/') || name.starts_with("./")
}

/// Split a qualified name at its first `/` into integration and action name
pub fn split_qualified(name: &str) -> Option<(&str, &str)> {
    name.split_once('/')
}

/// Path of the module a local name refers to.
///
/// A leading `/` is relative to `base_directory`, not the filesystem root.
pub fn local_module_path(base_directory: &Path, name: &str) -> PathBuf {
    normalize_path(&base_directory.join(name.trim_start_matches('/')))
}

pub struct NameResolver {
    cache: Arc<ModuleCache>,
    loader: Arc<dyn ModuleLoader>,
    catalog: Arc<dyn IntegrationCatalog>,
}

impl NameResolver {
    /// Resolver backed by the process-wide module cache
    pub fn new(loader: Arc<dyn ModuleLoader>, catalog: Arc<dyn IntegrationCatalog>) -> Self {
        Self { cache: ModuleCache::global(), loader, catalog }
    }

    /// Use a private module cache instead of the process-wide one
    pub fn with_cache(mut self, cache: Arc<ModuleCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn cache(&self) -> &Arc<ModuleCache> {
        &self.cache
    }

    pub fn resolve(
        &self,
        name: &str,
        base_directory: &Path,
        integrations: &IntegrationMap,
    ) -> RegistryResult<Arc<Action>> {
        if is_local_name(name) {
            self.resolve_local(name, base_directory)
        } else {
            self.resolve_qualified(name, integrations)
        }
    }

    pub fn resolve_local(&self, name: &str, base_directory: &Path) -> RegistryResult<Arc<Action>> {
        let path = local_module_path(base_directory, name);
        debug!(name, path = %path.display(), "resolving local action");
        self.cache.get_or_load(&path, self.loader.as_ref())
    }

    pub fn resolve_qualified(&self, name: &str, integrations: &IntegrationMap) -> RegistryResult<Arc<Action>> {
        let (integration_name, action_name) =
            split_qualified(name).ok_or_else(|| RegistryError::NoSeparator(name.to_string()))?;

        let integration: Arc<dyn Integration> = match integrations.get(integration_name) {
            Some(integration) => integration.clone(),
            None => {
                debug!(integration = integration_name, "integration not supplied, asking catalog");
                self.catalog.from_name(integration_name)?
            }
        };

        debug!(integration = integration.id(), action = action_name, "resolving integration action");
        integration.action(action_name)
    }
}

impl Default for NameResolver {
    fn default() -> Self {
        Self::new(Arc::new(FsModuleLoader::new()), Arc::new(EmptyCatalog))
    }
}

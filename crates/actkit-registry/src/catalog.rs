//! Fallback lookup for integrations the caller did not supply

use actkit_config::{load_document, EnvResolver, FileFormat};
use once_cell::sync::OnceCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{RegistryError, RegistryResult};
use crate::handlers::HandlerTable;
use crate::integration::{Integration, IntegrationManifest, StaticIntegration};

/// Resolves an integration from its name alone
pub trait IntegrationCatalog: Send + Sync {
    fn from_name(&self, name: &str) -> RegistryResult<Arc<dyn Integration>>;
}

/// A catalog that knows no integrations
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyCatalog;

impl IntegrationCatalog for EmptyCatalog {
    fn from_name(&self, name: &str) -> RegistryResult<Arc<dyn Integration>> {
        Err(RegistryError::IntegrationNotFound {
            name: name.to_string(),
            reason: "no integration catalog configured".to_string(),
        })
    }
}

/// Catalog over integrations registered up front
#[derive(Clone, Default)]
pub struct StaticCatalog {
    integrations: HashMap<String, Arc<dyn Integration>>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register under the integration's own id
    pub fn with_integration(mut self, integration: Arc<dyn Integration>) -> Self {
        self.insert(integration.id().to_string(), integration);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, integration: Arc<dyn Integration>) {
        self.integrations.insert(name.into(), integration);
    }
}

impl IntegrationCatalog for StaticCatalog {
    fn from_name(&self, name: &str) -> RegistryResult<Arc<dyn Integration>> {
        self.integrations.get(name).cloned().ok_or_else(|| RegistryError::IntegrationNotFound {
            name: name.to_string(),
            reason: "not registered".to_string(),
        })
    }
}

/// Loads integration manifests from directories on disk.
///
/// For a name `n`, each root is searched for `n.{yml,yaml,json}` and then
/// `n/integration.{yml,yaml,json}`. Loaded integrations are memoized; each
/// name is loaded once, without blocking lookups of other names.
pub struct DirectoryCatalog {
    roots: Vec<PathBuf>,
    handlers: HandlerTable,
    env: EnvResolver,
    loaded: Mutex<HashMap<String, Arc<OnceCell<Arc<dyn Integration>>>>>,
}

impl DirectoryCatalog {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            handlers: HandlerTable::new(),
            env: EnvResolver::default(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_env_resolver(mut self, env: EnvResolver) -> Self {
        self.env = env;
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for root in &self.roots {
            for ext in FileFormat::extensions() {
                paths.push(root.join(format!("{name}.{ext}")));
            }
            for ext in FileFormat::extensions() {
                paths.push(root.join(name).join(format!("integration.{ext}")));
            }
        }
        paths
    }

    fn locate_and_load(&self, name: &str) -> RegistryResult<Arc<dyn Integration>> {
        let path = self.candidates(name).into_iter().find(|p| p.is_file()).ok_or_else(|| {
            RegistryError::IntegrationNotFound {
                name: name.to_string(),
                reason: format!("no manifest under {} search root(s)", self.roots.len()),
            }
        })?;

        let integration = self.load(name, &path)?;
        tracing::info!(integration = %name, path = %path.display(), "loaded integration");
        Ok(Arc::new(integration))
    }

    fn load(&self, name: &str, path: &Path) -> RegistryResult<StaticIntegration> {
        let invalid = |reason: String| RegistryError::InvalidIntegration { name: name.to_string(), reason };

        let document = load_document(path, &self.env).map_err(|e| invalid(e.to_string()))?;
        let mut manifest: IntegrationManifest =
            serde_json::from_value(document).map_err(|e| invalid(e.to_string()))?;
        if manifest.id.is_empty() {
            manifest.id = name.to_string();
        }
        StaticIntegration::from_manifest(manifest, &self.handlers)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

impl IntegrationCatalog for DirectoryCatalog {
    fn from_name(&self, name: &str) -> RegistryResult<Arc<dyn Integration>> {
        if !is_valid_name(name) {
            return Err(RegistryError::IntegrationNotFound {
                name: name.to_string(),
                reason: "invalid integration name".to_string(),
            });
        }

        let cell = {
            let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
            loaded.entry(name.to_string()).or_default().clone()
        };

        let result = cell.get_or_try_init(|| self.locate_and_load(name)).cloned();
        if result.is_err() {
            let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
            let vacant = loaded
                .get(name)
                .map_or(false, |slot| Arc::ptr_eq(slot, &cell) && slot.get().is_none());
            if vacant {
                loaded.remove(name);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn empty_catalog_finds_nothing() {
        let err = EmptyCatalog.from_name("github").err().unwrap();
        assert!(matches!(err, RegistryError::IntegrationNotFound { ref name, .. } if name == "github"));
    }

    #[test]
    fn static_catalog_uses_integration_ids() {
        let catalog = StaticCatalog::new().with_integration(Arc::new(StaticIntegration::new("slack")));
        assert_eq!(catalog.from_name("slack").unwrap().id(), "slack");
        assert!(catalog.from_name("github").err().unwrap().is_not_found());
    }

    #[test]
    fn directory_catalog_searches_roots_in_order() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        fs::create_dir(second.path().join("github")).unwrap();
        fs::write(
            second.path().join("github").join("integration.yaml"),
            "title: GitHub\nactions:\n  users.get:\n    title: Get a user\n",
        )
        .unwrap();
        fs::write(first.path().join("slack.json"), r#"{"id": "slack-v2", "actions": {}}"#).unwrap();

        let catalog = DirectoryCatalog::new([first.path(), second.path()]);

        let github = catalog.from_name("github").unwrap();
        assert_eq!(github.id(), "github");
        assert_eq!(github.action("users.get").unwrap().id(), "github/users.get");

        let slack = catalog.from_name("slack").unwrap();
        assert_eq!(slack.id(), "slack-v2");

        let again = catalog.from_name("github").unwrap();
        assert!(Arc::ptr_eq(&github, &again));
    }

    #[test]
    fn directory_catalog_rejects_unsafe_names() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = DirectoryCatalog::new([dir.path()]);
        for name in ["", "..", "a b", "x\\y"] {
            assert!(catalog.from_name(name).err().unwrap().is_not_found(), "{name:?}");
        }
    }

    #[test]
    fn missing_integrations_are_retried_without_leaking_slots() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = DirectoryCatalog::new([dir.path()]);

        for i in 0..100 {
            assert!(catalog.from_name(&format!("ghost-{i}")).err().unwrap().is_not_found());
        }
        assert!(catalog.loaded.lock().unwrap().is_empty());

        fs::write(dir.path().join("ghost-0.yml"), "actions: {}\n").unwrap();
        assert_eq!(catalog.from_name("ghost-0").unwrap().id(), "ghost-0");
        assert_eq!(catalog.loaded.lock().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_lookups_share_one_integration() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("github.json"), r#"{"actions": {"users.get": {}}}"#).unwrap();
        let catalog = Arc::new(DirectoryCatalog::new([dir.path()]));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let catalog = Arc::clone(&catalog);
                std::thread::spawn(move || catalog.from_name("github").ok().unwrap())
            })
            .collect();
        let found: Vec<Arc<dyn Integration>> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert!(found.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    }

    #[test]
    fn broken_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), r#"{"actions": []}"#).unwrap();
        let catalog = DirectoryCatalog::new([dir.path()]);
        let err = catalog.from_name("bad").err().unwrap();
        assert!(matches!(err, RegistryError::InvalidIntegration { ref name, .. } if name == "bad"));
    }
}

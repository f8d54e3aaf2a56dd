//! Local action modules: loaders and the process-wide module cache

use actkit_config::{load_document, EnvResolver, FileFormat};
use actkit_core::{Action, ActionDescriptor, Handler};
use once_cell::sync::{Lazy, OnceCell};
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{RegistryError, RegistryResult};
use crate::handlers::{assemble_action, HandlerTable};

/// What a loader found at a path
#[derive(Clone)]
pub enum LoadedModule {
    /// An action that is already built
    Action(Arc<Action>),
    /// A raw descriptor still to be turned into an action
    Descriptor {
        descriptor: ActionDescriptor,
        handler: Option<Arc<dyn Handler>>,
    },
}

impl LoadedModule {
    pub fn descriptor(descriptor: ActionDescriptor) -> Self {
        Self::Descriptor { descriptor, handler: None }
    }

    /// Normalize into an action
    pub fn into_action(self) -> RegistryResult<Arc<Action>> {
        match self {
            Self::Action(action) => Ok(action),
            Self::Descriptor { descriptor, handler } => Ok(Arc::new(assemble_action(descriptor, handler)?)),
        }
    }
}

/// Loads the module stored at a path
pub trait ModuleLoader: Send + Sync {
    fn load(&self, path: &Path) -> RegistryResult<LoadedModule>;
}

static GLOBAL_CACHE: Lazy<Arc<ModuleCache>> = Lazy::new(|| Arc::new(ModuleCache::new()));

/// Append-only cache of loaded modules, keyed by normalized path.
///
/// Each path is loaded at most once; concurrent first loads of the same path
/// wait for a single loader call. Failed loads are not cached and leave no
/// entry behind. Entries are keyed by path alone, so a cache should only be
/// shared by resolvers whose loaders agree on what a path holds.
#[derive(Default)]
pub struct ModuleCache {
    entries: Mutex<HashMap<PathBuf, Arc<OnceCell<Arc<Action>>>>>,
}

impl ModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache shared by every resolver that isn't given its own.
    /// `Runtime`s never use it, since each binds its own handlers.
    pub fn global() -> Arc<ModuleCache> {
        GLOBAL_CACHE.clone()
    }

    pub fn get_or_load(&self, path: &Path, loader: &dyn ModuleLoader) -> RegistryResult<Arc<Action>> {
        let key = normalize_path(path);
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.entry(key.clone()).or_default().clone()
        };

        if let Some(action) = cell.get() {
            tracing::debug!(path = %key.display(), "module cache hit");
            return Ok(action.clone());
        }
        let result = cell
            .get_or_try_init(|| {
                tracing::debug!(path = %key.display(), "loading module");
                loader.load(&key)?.into_action()
            })
            .cloned();

        if result.is_err() {
            // Only loaded modules keep a slot.
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let vacant = entries
                .get(&key)
                .map_or(false, |slot| Arc::ptr_eq(slot, &cell) && slot.get().is_none());
            if vacant {
                entries.remove(&key);
            }
        }
        result
    }

    /// Whether a module has been successfully loaded for `path`
    pub fn contains(&self, path: &Path) -> bool {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.get(&normalize_path(path)).map_or(false, |cell| cell.get().is_some())
    }

    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lexically normalize a path: drop `.` segments and fold `..` into their parent.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let can_pop = matches!(normalized.components().next_back(), Some(Component::Normal(_)));
                if can_pop {
                    normalized.pop();
                } else if !normalized.has_root() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Loads action descriptors from YAML or JSON files
#[derive(Debug, Clone, Default)]
pub struct FsModuleLoader {
    handlers: HandlerTable,
    env: EnvResolver,
}

impl FsModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a handler available to descriptors that name it
    pub fn with_handler(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.handlers.register(name, handler);
        self
    }

    pub fn with_handlers(mut self, handlers: HandlerTable) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_env_resolver(mut self, env: EnvResolver) -> Self {
        self.env = env;
        self
    }

    /// The file backing `path`: the path itself, else the path with each
    /// known extension appended.
    fn locate(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        FileFormat::extensions().iter().find_map(|ext| {
            let mut candidate = OsString::from(path.as_os_str());
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            candidate.is_file().then_some(candidate)
        })
    }
}

impl ModuleLoader for FsModuleLoader {
    fn load(&self, path: &Path) -> RegistryResult<LoadedModule> {
        let file = self.locate(path).ok_or_else(|| RegistryError::ModuleNotFound(path.to_path_buf()))?;
        let document =
            load_document(&file, &self.env).map_err(|e| RegistryError::invalid_module(&file, e))?;
        let descriptor: ActionDescriptor = serde_json::from_value(document)
            .map_err(|e| RegistryError::InvalidModule { path: file.clone(), reason: e.to_string() })?;
        let handler = self.handlers.handler_for(&descriptor, &file.display().to_string())?;
        Ok(LoadedModule::Descriptor { descriptor, handler })
    }
}

/// In-memory loader for modules registered by the host program
#[derive(Clone, Default)]
pub struct StaticModuleLoader {
    modules: HashMap<PathBuf, LoadedModule>,
}

impl StaticModuleLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, module: LoadedModule) {
        self.modules.insert(normalize_path(path.as_ref()), module);
    }

    pub fn with_action(mut self, path: impl AsRef<Path>, action: Arc<Action>) -> Self {
        self.insert(path, LoadedModule::Action(action));
        self
    }

    pub fn with_descriptor(mut self, path: impl AsRef<Path>, descriptor: ActionDescriptor) -> Self {
        self.insert(path, LoadedModule::descriptor(descriptor));
        self
    }
}

impl ModuleLoader for StaticModuleLoader {
    fn load(&self, path: &Path) -> RegistryResult<LoadedModule> {
        self.modules
            .get(&normalize_path(path))
            .cloned()
            .ok_or_else(|| RegistryError::ModuleNotFound(path.to_path_buf()))
    }
}

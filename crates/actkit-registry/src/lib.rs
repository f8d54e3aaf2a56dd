pub mod catalog;
pub mod error;
pub mod handlers;
pub mod integration;
pub mod module;
pub mod resolver;

// Re-export commonly used types
pub use catalog::{DirectoryCatalog, EmptyCatalog, IntegrationCatalog, StaticCatalog};
pub use error::{RegistryError, RegistryResult};
pub use handlers::HandlerTable;
pub use integration::{Integration, IntegrationManifest, IntegrationMap, StaticIntegration};
pub use module::{
    normalize_path, FsModuleLoader, LoadedModule, ModuleCache, ModuleLoader, StaticModuleLoader,
};
pub use resolver::{is_local_name, local_module_path, split_qualified, NameResolver};

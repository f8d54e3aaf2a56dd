//! Integrations: named collections of actions

use actkit_core::{Action, ActionDescriptor, SecurityRequirement};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{RegistryError, RegistryResult};
use crate::handlers::HandlerTable;

/// A named collection of actions
pub trait Integration: Send + Sync {
    fn id(&self) -> &str;

    /// Look up an action by its name within this integration.
    /// Unknown names fail with [`RegistryError::ActionNotFound`].
    fn action(&self, name: &str) -> RegistryResult<Arc<Action>>;

    fn action_names(&self) -> Vec<String>;
}

/// Caller-supplied integrations, keyed by the prefix used in qualified names
pub type IntegrationMap = HashMap<String, Arc<dyn Integration>>;

/// On-disk description of an integration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IntegrationManifest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Requirements inherited by actions that declare none of their own
    #[serde(default)]
    pub security: IndexMap<String, Option<SecurityRequirement>>,
    /// Actions keyed by name, e.g. `users.get`
    #[serde(default)]
    pub actions: IndexMap<String, ActionDescriptor>,
}

/// In-memory integration holding pre-built actions
pub struct StaticIntegration {
    id: String,
    title: String,
    description: String,
    actions: IndexMap<String, Arc<Action>>,
}

impl StaticIntegration {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: String::new(),
            actions: IndexMap::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_action(mut self, name: impl Into<String>, action: Arc<Action>) -> Self {
        self.add_action(name, action);
        self
    }

    pub fn add_action(&mut self, name: impl Into<String>, action: Arc<Action>) {
        self.actions.insert(name.into(), action);
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Build every action of a manifest.
    ///
    /// Actions without an id get `<integration>/<name>`; actions without
    /// security requirements inherit the integration's.
    pub fn from_manifest(manifest: IntegrationManifest, handlers: &HandlerTable) -> RegistryResult<Self> {
        if manifest.id.trim().is_empty() {
            return Err(RegistryError::InvalidIntegration {
                name: manifest.title.clone(),
                reason: "missing id".to_string(),
            });
        }

        let mut integration = Self::new(manifest.id.clone())
            .with_title(manifest.title)
            .with_description(manifest.description);
        let origin = format!("integration {}", manifest.id);

        for (name, mut descriptor) in manifest.actions {
            if name.is_empty() {
                return Err(RegistryError::InvalidIntegration {
                    name: manifest.id.clone(),
                    reason: "action with an empty name".to_string(),
                });
            }
            descriptor.id.get_or_insert_with(|| format!("{}/{}", manifest.id, name));
            if descriptor.security.is_empty() {
                descriptor.security = manifest.security.clone();
            }
            let action = handlers.build_action(descriptor, &origin)?;
            integration.add_action(name, Arc::new(action));
        }

        tracing::debug!(
            integration = %integration.id,
            actions = integration.actions.len(),
            "built integration from manifest"
        );
        Ok(integration)
    }
}

impl Integration for StaticIntegration {
    fn id(&self) -> &str {
        &self.id
    }

    fn action(&self, name: &str) -> RegistryResult<Arc<Action>> {
        self.actions.get(name).cloned().ok_or_else(|| RegistryError::ActionNotFound {
            integration: self.id.clone(),
            action: name.to_string(),
        })
    }

    fn action_names(&self) -> Vec<String> {
        self.actions.keys().cloned().collect()
    }
}

impl fmt::Debug for StaticIntegration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticIntegration")
            .field("id", &self.id)
            .field("title", &self.title)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}

use actkit_core::{Action, ActionBuilder, ActionDescriptor, Handler};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{RegistryError, RegistryResult};

/// Handlers registered by the host program, referenced by name from module
/// files and integration manifests.
#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn Handler>) {
        self.handlers.insert(name.into(), handler);
    }

    pub fn with_handler(mut self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.register(name, handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(name).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Look up the handler a descriptor names, if any. `origin` describes
    /// where the descriptor came from for error reporting.
    pub fn handler_for(
        &self,
        descriptor: &ActionDescriptor,
        origin: &str,
    ) -> RegistryResult<Option<Arc<dyn Handler>>> {
        match descriptor.handler.as_deref() {
            None => Ok(None),
            Some(name) => self.get(name).map(Some).ok_or_else(|| RegistryError::HandlerNotFound {
                origin: origin.to_string(),
                handler: name.to_string(),
            }),
        }
    }

    /// Build an action from a descriptor, wiring in its named handler.
    pub fn build_action(&self, descriptor: ActionDescriptor, origin: &str) -> RegistryResult<Action> {
        let handler = self.handler_for(&descriptor, origin)?;
        assemble_action(descriptor, handler)
    }
}

/// Build an action from a descriptor and an already looked-up handler.
/// Without a handler the action falls back to the null handler.
pub(crate) fn assemble_action(
    descriptor: ActionDescriptor,
    handler: Option<Arc<dyn Handler>>,
) -> RegistryResult<Action> {
    let mut builder = ActionBuilder::from(descriptor);
    if let Some(handler) = handler {
        builder = builder.handler(handler);
    }
    Ok(builder.build()?)
}

impl fmt::Debug for HandlerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("HandlerTable").field("handlers", &names).finish()
    }
}

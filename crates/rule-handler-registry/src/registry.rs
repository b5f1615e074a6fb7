//! Registry of handler factories keyed by type prefix

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rule_core::type_prefix;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::handler::ModuleHandlerFactory;

/// Result type for registry lookups
pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no handler factory registered for type prefix '{0}'")]
    MissingHandler(String),
}

/// Thread-safe handle to a registry
pub type SharedHandlerRegistry = Arc<HandlerFactoryRegistry>;

/// Maps type prefixes to the factory serving them
///
/// The first factory registered for a prefix keeps it until it is
/// unregistered; later registrations for the same prefix are rejected.
pub struct HandlerFactoryRegistry {
    factories: DashMap<String, Arc<dyn ModuleHandlerFactory>>,
}

impl HandlerFactoryRegistry {
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
        }
    }

    /// Register `factory` under `prefix`
    ///
    /// Returns false when another factory already owns the prefix.
    #[instrument(skip(self, factory))]
    pub fn register(&self, prefix: &str, factory: Arc<dyn ModuleHandlerFactory>) -> bool {
        match self.factories.entry(prefix.to_string()) {
            Entry::Occupied(_) => {
                warn!(prefix = %prefix, "Handler factory already registered for prefix, ignoring");
                false
            }
            Entry::Vacant(slot) => {
                debug!(prefix = %prefix, "Registering handler factory");
                slot.insert(factory);
                true
            }
        }
    }

    /// Register `factory` under every prefix it reports
    ///
    /// Returns the prefixes that were accepted.
    pub fn add_factory(&self, factory: Arc<dyn ModuleHandlerFactory>) -> Vec<String> {
        factory
            .types()
            .into_iter()
            .filter(|prefix| self.register(prefix, factory.clone()))
            .collect()
    }

    /// Remove `factory` from every prefix it owns
    ///
    /// Returns the prefixes that were released.
    pub fn remove_factory(&self, factory: &Arc<dyn ModuleHandlerFactory>) -> Vec<String> {
        let mut released = Vec::new();
        for prefix in factory.types() {
            let removed = self
                .factories
                .remove_if(&prefix, |_, owner| Arc::ptr_eq(owner, factory))
                .is_some();
            if removed {
                debug!(prefix = %prefix, "Unregistered handler factory");
                released.push(prefix);
            }
        }
        released
    }

    #[instrument(skip(self))]
    pub fn unregister(&self, prefix: &str) -> Option<Arc<dyn ModuleHandlerFactory>> {
        let removed = self.factories.remove(prefix).map(|(_, factory)| factory);
        if removed.is_some() {
            debug!(prefix = %prefix, "Unregistered handler factory");
        }
        removed
    }

    /// Factory owning `prefix`
    pub fn lookup(&self, prefix: &str) -> RegistryResult<Arc<dyn ModuleHandlerFactory>> {
        self.factories
            .get(prefix)
            .map(|factory| factory.clone())
            .ok_or_else(|| RegistryError::MissingHandler(prefix.to_string()))
    }

    /// Factory serving a full module type UID
    pub fn lookup_for_type(&self, type_uid: &str) -> RegistryResult<Arc<dyn ModuleHandlerFactory>> {
        self.lookup(type_prefix(type_uid))
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.factories.contains_key(prefix)
    }

    /// Registered prefixes, sorted
    pub fn prefixes(&self) -> Vec<String> {
        let mut prefixes: Vec<_> = self.factories.iter().map(|e| e.key().clone()).collect();
        prefixes.sort();
        prefixes
    }
}

impl Default for HandlerFactoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

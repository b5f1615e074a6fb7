//! Read-only catalogs of module types and rule templates
//!
//! The engine only consumes these through the [`ModuleTypeCatalog`] and
//! [`TemplateCatalog`] traits. The DashMap-backed registries here serve
//! hosts and tests that keep the definitions in memory.

use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::module_type::{ModuleType, RuleTemplate};

/// Lookup of module type declarations by UID
pub trait ModuleTypeCatalog: Send + Sync {
    fn get_type(&self, uid: &str) -> Option<ModuleType>;
}

/// Lookup of rule templates by UID
pub trait TemplateCatalog: Send + Sync {
    fn get_template(&self, uid: &str) -> Option<RuleTemplate>;
}

/// Thread-safe handle to a module type catalog
pub type SharedModuleTypeCatalog = Arc<dyn ModuleTypeCatalog>;

/// Thread-safe handle to a template catalog
pub type SharedTemplateCatalog = Arc<dyn TemplateCatalog>;

/// In-memory module type catalog
#[derive(Debug, Default)]
pub struct ModuleTypeRegistry {
    types: DashMap<String, ModuleType>,
}

impl ModuleTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a module type
    pub fn add(&self, module_type: ModuleType) {
        debug!(uid = %module_type.uid, kind = %module_type.kind, "Registering module type");
        self.types.insert(module_type.uid.clone(), module_type);
    }

    /// Add several module types at once
    pub fn extend(&self, module_types: impl IntoIterator<Item = ModuleType>) {
        for module_type in module_types {
            self.add(module_type);
        }
    }

    pub fn remove(&self, uid: &str) -> Option<ModuleType> {
        self.types.remove(uid).map(|(_, t)| t)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl ModuleTypeCatalog for ModuleTypeRegistry {
    fn get_type(&self, uid: &str) -> Option<ModuleType> {
        self.types.get(uid).map(|t| t.value().clone())
    }
}

/// In-memory template catalog
#[derive(Debug, Default)]
pub struct TemplateRegistry {
    templates: DashMap<String, RuleTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, template: RuleTemplate) {
        debug!(uid = %template.uid, "Registering rule template");
        self.templates.insert(template.uid.clone(), template);
    }

    pub fn remove(&self, uid: &str) -> Option<RuleTemplate> {
        self.templates.remove(uid).map(|(_, t)| t)
    }
}

impl TemplateCatalog for TemplateRegistry {
    fn get_template(&self, uid: &str) -> Option<RuleTemplate> {
        self.templates.get(uid).map(|t| t.value().clone())
    }
}

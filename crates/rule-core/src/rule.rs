//! Rule definition
//!
//! A rule wires triggers, conditions and actions together. Rules handed
//! across the engine API are value snapshots; the engine never aliases the
//! caller's copy.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::error::{ModelError, ModelResult};
use crate::module::{Configuration, Module, ModuleKind};
use crate::module_type::ConfigDescriptor;

/// A Trigger → Condition → Action rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Assigned on first add when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub triggers: Vec<Module>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Module>,

    #[serde(default)]
    pub actions: Vec<Module>,

    #[serde(default, skip_serializing_if = "indexmap::IndexMap::is_empty")]
    pub configuration: Configuration,

    /// Parameters of the rule-level configuration
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub config_descriptions: Vec<ConfigDescriptor>,

    /// Template the modules are instantiated from when the rule has none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_uid: Option<String>,

    /// Owning principal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope_identifier: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// Create a rule from its module lists
    pub fn new(triggers: Vec<Module>, conditions: Vec<Module>, actions: Vec<Module>) -> Self {
        Self {
            uid: None,
            name: None,
            tags: BTreeSet::new(),
            description: None,
            triggers,
            conditions,
            actions,
            configuration: Configuration::new(),
            config_descriptions: Vec::new(),
            template_uid: None,
            scope_identifier: None,
            enabled: true,
        }
    }

    /// Create an empty rule to be instantiated from a template
    pub fn from_template(template_uid: impl Into<String>, configuration: Configuration) -> Self {
        let mut rule = Self::new(Vec::new(), Vec::new(), Vec::new());
        rule.template_uid = Some(template_uid.into());
        rule.configuration = configuration;
        rule
    }

    pub fn with_uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_config(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.configuration.insert(name.into(), value);
        self
    }

    /// UID or an empty string for rules not yet added
    pub fn uid_str(&self) -> &str {
        self.uid.as_deref().unwrap_or_default()
    }

    /// Get display name (name or UID)
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.uid_str())
    }

    /// Whether modules must still be instantiated from a template
    pub fn needs_template(&self) -> bool {
        self.template_uid.is_some()
            && self.triggers.is_empty()
            && self.conditions.is_empty()
            && self.actions.is_empty()
    }

    /// All modules in declared order, tagged with their kind
    pub fn modules(&self) -> impl Iterator<Item = (ModuleKind, &Module)> {
        self.triggers
            .iter()
            .map(|m| (ModuleKind::Trigger, m))
            .chain(self.conditions.iter().map(|m| (ModuleKind::Condition, m)))
            .chain(self.actions.iter().map(|m| (ModuleKind::Action, m)))
    }

    /// Look up a module by id across all three lists
    pub fn module(&self, id: &str) -> Option<(ModuleKind, &Module)> {
        self.modules().find(|(_, m)| m.id == id)
    }

    /// Validate module ids and per-module structure
    pub fn validate(&self) -> ModelResult<()> {
        let mut ids = HashSet::new();
        for (kind, module) in self.modules() {
            module.validate(kind)?;
            if !ids.insert(module.id.as_str()) {
                return Err(ModelError::DuplicateModuleId(module.id.clone()));
            }
        }
        Ok(())
    }
}

//! Modules and the connections between them

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ModelError, ModelResult};
use crate::TYPE_SEPARATOR;

/// Configuration of a module or rule, keyed by parameter name
///
/// Insertion order is kept so persisted rules round-trip unchanged.
pub type Configuration = IndexMap<String, serde_json::Value>;

/// Input or output values of a module, keyed by name
pub type Values = HashMap<String, serde_json::Value>;

/// Which part of a rule a module belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    Trigger,
    Condition,
    Action,
}

impl ModuleKind {
    /// Whether modules of this kind consume inputs through connections
    pub fn has_inputs(self) -> bool {
        matches!(self, ModuleKind::Condition | ModuleKind::Action)
    }

    /// Whether modules of this kind publish outputs other modules can read
    pub fn has_outputs(self) -> bool {
        matches!(self, ModuleKind::Trigger | ModuleKind::Action)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ModuleKind::Trigger => "trigger",
            ModuleKind::Condition => "condition",
            ModuleKind::Action => "action",
        }
    }
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static wiring from an input of the owning module to an output of a
/// sibling module in the same rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Input of the owning module
    pub input_name: String,

    /// Module id of the value source
    pub source_module_id: String,

    /// Output of the source module
    pub source_output_name: String,
}

impl Connection {
    pub fn new(
        input_name: impl Into<String>,
        source_module_id: impl Into<String>,
        source_output_name: impl Into<String>,
    ) -> Self {
        Self {
            input_name: input_name.into(),
            source_module_id: source_module_id.into(),
            source_output_name: source_output_name.into(),
        }
    }
}

/// A trigger, condition or action instance inside a rule
///
/// Which of the three a module is follows from the rule list holding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Unique within the owning rule
    pub id: String,

    /// Module type UID, e.g. `core:EventTrigger`
    #[serde(rename = "type")]
    pub type_uid: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub configuration: Configuration,

    /// Input wiring; always empty for triggers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<Connection>,
}

impl Module {
    /// Create a module with an empty configuration
    pub fn new(id: impl Into<String>, type_uid: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_uid: type_uid.into(),
            label: None,
            description: None,
            configuration: Configuration::new(),
            connections: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set a configuration parameter
    pub fn with_config(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.configuration.insert(name.into(), value);
        self
    }

    /// Feed `input` from `source_output` of module `source_module`
    pub fn with_connection(
        mut self,
        input: impl Into<String>,
        source_module: impl Into<String>,
        source_output: impl Into<String>,
    ) -> Self {
        self.connections
            .push(Connection::new(input, source_module, source_output));
        self
    }

    /// The handler-factory lookup key of this module
    pub fn type_prefix(&self) -> &str {
        type_prefix(&self.type_uid)
    }

    /// Check structural constraints that do not depend on sibling modules
    pub fn validate(&self, kind: ModuleKind) -> ModelResult<()> {
        if self.id.is_empty() {
            return Err(ModelError::EmptyModuleId);
        }
        if self.type_uid.is_empty() {
            return Err(ModelError::EmptyTypeUid {
                module: self.id.clone(),
            });
        }
        if !kind.has_inputs() && !self.connections.is_empty() {
            return Err(ModelError::TriggerConnections(self.id.clone()));
        }

        let mut seen = std::collections::HashSet::new();
        for connection in &self.connections {
            if !seen.insert(connection.input_name.as_str()) {
                return Err(ModelError::DuplicateConnection {
                    module: self.id.clone(),
                    input: connection.input_name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// The part of a type UID before its first `:`
pub fn type_prefix(type_uid: &str) -> &str {
    type_uid
        .split_once(TYPE_SEPARATOR)
        .map_or(type_uid, |(prefix, _)| prefix)
}

/// The type UID one level up the `:` hierarchy, if any
///
/// `System:Custom:Dimmer` → `System:Custom` → `System` → `None`
pub fn parent_type_uid(type_uid: &str) -> Option<&str> {
    type_uid
        .rsplit_once(TYPE_SEPARATOR)
        .map(|(parent, _)| parent)
        .filter(|parent| !parent.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_prefix() {
        assert_eq!(type_prefix("core:EventTrigger"), "core");
        assert_eq!(type_prefix("System:Custom:Dimmer"), "System");
        assert_eq!(type_prefix("plain"), "plain");
    }

    #[test]
    fn test_parent_type_uid_walks_up() {
        assert_eq!(parent_type_uid("System:Custom:Dimmer"), Some("System:Custom"));
        assert_eq!(parent_type_uid("System:Custom"), Some("System"));
        assert_eq!(parent_type_uid("System"), None);
    }

    #[test]
    fn test_trigger_cannot_have_connections() {
        let module = Module::new("t1", "core:EventTrigger").with_connection("in", "a1", "out");
        assert_eq!(
            module.validate(ModuleKind::Trigger),
            Err(ModelError::TriggerConnections("t1".into()))
        );
        assert!(module.validate(ModuleKind::Action).is_ok());
    }

    #[test]
    fn test_duplicate_input_connection_rejected() {
        let module = Module::new("c1", "core:CompareCondition")
            .with_connection("input", "t1", "a")
            .with_connection("input", "t1", "b");

        assert!(matches!(
            module.validate(ModuleKind::Condition),
            Err(ModelError::DuplicateConnection { .. })
        ));
    }

    #[test]
    fn test_module_deserialize() {
        let module: Module = serde_json::from_value(json!({
            "id": "c1",
            "type": "core:CompareCondition",
            "configuration": {"operator": ">", "right": "5"},
            "connections": [
                {"input_name": "input", "source_module_id": "t1", "source_output_name": "level"}
            ]
        }))
        .unwrap();

        assert_eq!(module.type_prefix(), "core");
        assert_eq!(module.configuration["operator"], ">");
        assert_eq!(module.connections[0].source_module_id, "t1");
    }
}

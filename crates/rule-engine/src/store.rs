//! Per-rule output store
//!
//! Triggers and actions publish their resolved outputs here; connected
//! inputs read them back at evaluation time.

use dashmap::DashMap;
use rule_core::Values;
use serde_json::Value;

/// Location of one output inside a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OutputRef {
    pub module_id: String,
    pub output_name: String,
}

impl OutputRef {
    pub fn new(module_id: impl Into<String>, output_name: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            output_name: output_name.into(),
        }
    }
}

impl std::fmt::Display for OutputRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.module_id, self.output_name)
    }
}

/// Output values of every source module of one rule
#[derive(Debug, Default)]
pub struct OutputStore {
    modules: DashMap<String, Values>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the module's values with those of its latest firing
    ///
    /// Outputs missing from `outputs` read as absent afterwards.
    pub fn publish(&self, module_id: &str, outputs: Values) {
        self.modules.insert(module_id.to_string(), outputs);
    }

    /// Current value of one output
    pub fn read(&self, source: &OutputRef) -> Option<Value> {
        self.modules
            .get(&source.module_id)
            .and_then(|values| values.get(&source.output_name).cloned())
    }

    /// Copy of all values a module has published
    pub fn snapshot(&self, module_id: &str) -> Option<Values> {
        self.modules.get(module_id).map(|values| values.clone())
    }
}

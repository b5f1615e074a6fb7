//! Effective descriptor sets over the module type hierarchy

use rule_core::{parent_type_uid, ConfigDescriptor, Input, ModuleTypeCatalog, Output};
use std::collections::HashSet;
use tracing::trace;

/// Declarations of a type merged with those of all its ancestors
///
/// The most specific declaration of a name wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EffectiveDescriptors {
    pub config: Vec<ConfigDescriptor>,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl EffectiveDescriptors {
    /// Walk from `type_uid` up through each `:`-truncated parent UID
    ///
    /// Returns `None` when no type along the chain is known to the catalog.
    pub fn collect(catalog: &dyn ModuleTypeCatalog, type_uid: &str) -> Option<Self> {
        let mut result = Self::default();
        let mut found = false;
        let mut config_names = HashSet::new();
        let mut input_names = HashSet::new();
        let mut output_names = HashSet::new();

        let mut current = Some(type_uid);
        while let Some(uid) = current {
            if let Some(module_type) = catalog.get_type(uid) {
                trace!(%uid, "Merging module type declarations");
                found = true;

                for descriptor in module_type.config_descriptions {
                    if config_names.insert(descriptor.name.clone()) {
                        result.config.push(descriptor);
                    }
                }
                for input in module_type.inputs {
                    if input_names.insert(input.name.clone()) {
                        result.inputs.push(input);
                    }
                }
                for output in module_type.outputs {
                    if output_names.insert(output.name.clone()) {
                        result.outputs.push(output);
                    }
                }
            }
            current = parent_type_uid(uid);
        }

        found.then_some(result)
    }

    pub fn config(&self, name: &str) -> Option<&ConfigDescriptor> {
        self.config.iter().find(|d| d.name == name)
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.iter().find(|i| i.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.iter().find(|o| o.name == name)
    }
}

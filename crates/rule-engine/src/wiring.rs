//! Connection wiring
//!
//! A condition or action declares which upstream output feeds each of its
//! inputs. Connections are validated when the rule is bound; the lookup
//! table itself is built on first use and holds references into the
//! rule's [`OutputStore`], so every read sees the latest published value.

use rule_core::{Input, Module, Rule, Values};
use rule_resolver::{assemble_inputs, EffectiveDescriptors, InputRefs, TypeRegistry};
use std::collections::HashMap;
use tracing::trace;

use crate::error::WiringError;
use crate::store::{OutputRef, OutputStore};

/// Input sources and input references of one connected module
#[derive(Debug, Clone, Default)]
pub(crate) struct Wiring {
    sources: Vec<(String, OutputRef)>,
    input_refs: InputRefs,
}

impl Wiring {
    pub(crate) fn build(module: &Module, descriptors: &EffectiveDescriptors) -> Self {
        let sources = module
            .connections
            .iter()
            .map(|c| {
                (
                    c.input_name.clone(),
                    OutputRef::new(&c.source_module_id, &c.source_output_name),
                )
            })
            .collect();

        trace!(module = %module.id, connections = module.connections.len(), "Wired module");

        Self {
            sources,
            input_refs: InputRefs::resolve(&descriptors.inputs),
        }
    }

    /// Effective inputs given the current contents of `store`
    ///
    /// A connected output that has not been published yet leaves its input
    /// to the declared default, if any.
    pub(crate) fn inputs(&self, declared: &[Input], store: &OutputStore) -> Values {
        let direct: Values = self
            .sources
            .iter()
            .filter_map(|(input, source)| store.read(source).map(|value| (input.clone(), value)))
            .collect();

        assemble_inputs(declared, &self.input_refs, &direct)
    }
}

/// Check every connection of `rule` against its sibling modules
///
/// `descriptors` maps module ids to the effective declarations of their
/// types; types unknown to the catalog skip the type check.
pub(crate) fn validate_connections(
    rule: &Rule,
    descriptors: &HashMap<String, EffectiveDescriptors>,
    types: &TypeRegistry,
) -> Result<(), WiringError> {
    for (_, module) in rule.modules() {
        for connection in &module.connections {
            let (kind, source) = rule.module(&connection.source_module_id).ok_or_else(|| {
                WiringError::UnknownSource {
                    module: module.id.clone(),
                    input: connection.input_name.clone(),
                    source_module: connection.source_module_id.clone(),
                }
            })?;

            if !kind.has_outputs() {
                return Err(WiringError::NotASource {
                    module: module.id.clone(),
                    input: connection.input_name.clone(),
                    source_module: source.id.clone(),
                    kind: kind.to_string(),
                });
            }

            let input = descriptors
                .get(&module.id)
                .and_then(|d| d.input(&connection.input_name));
            let output = descriptors
                .get(&source.id)
                .and_then(|d| d.output(&connection.source_output_name));

            if let (Some(input), Some(output)) = (input, output) {
                if !types.is_compatible(&output.value_type, &input.value_type) {
                    return Err(WiringError::TypeMismatch {
                        module: module.id.clone(),
                        input: input.name.clone(),
                        input_type: input.value_type.clone(),
                        source_module: source.id.clone(),
                        output: output.name.clone(),
                        output_type: output.value_type.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}

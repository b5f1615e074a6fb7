//! Handler binding
//!
//! Binding turns a stored rule into runnable modules: the rule's own
//! configuration is resolved, every module configuration is resolved
//! against the effective descriptors of its type, connections are
//! validated, and a handler is created for each module. Binding is
//! all-or-nothing: when any module fails, the handlers created so far are
//! disposed again in reverse order (triggers, actions, conditions).

use rule_core::{
    parse_reference, Configuration, Module, ModuleKind, ModuleTypeCatalog, Rule, RuleStatusDetail,
    TemplateCatalog, Values,
};
use rule_handler_registry::{HandlerFactoryRegistry, ModuleHandler, ModuleHandlerFactory};
use rule_resolver::{resolve_configuration, EffectiveDescriptors, TypeRegistry};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace, warn};

use crate::store::OutputStore;
use crate::wiring::{validate_connections, Wiring};

/// Why a rule could not be bound
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BindFailure {
    pub detail: RuleStatusDetail,
    pub description: String,
}

impl BindFailure {
    fn configuration(description: impl Into<String>) -> Self {
        Self {
            detail: RuleStatusDetail::ConfigurationError,
            description: description.into(),
        }
    }
}

/// A module with its resolved configuration and bound handler
pub(crate) struct BoundModule {
    pub kind: ModuleKind,
    pub module: Module,
    pub descriptors: EffectiveDescriptors,
    pub handler: ModuleHandler,
    pub factory: Arc<dyn ModuleHandlerFactory>,
    wiring: OnceLock<Wiring>,
}

impl BoundModule {
    /// Effective inputs, wiring the module on first use
    pub(crate) fn inputs(&self, store: &OutputStore) -> Values {
        self.wiring
            .get_or_init(|| Wiring::build(&self.module, &self.descriptors))
            .inputs(&self.descriptors.inputs, store)
    }
}

/// Handlers of one rule in declared order, per module kind
pub(crate) struct BoundModules {
    pub triggers: Vec<BoundModule>,
    pub conditions: Vec<BoundModule>,
    pub actions: Vec<BoundModule>,
}

/// Lookup services used while binding
pub(crate) struct Binder<'a> {
    pub registry: &'a HandlerFactoryRegistry,
    pub types: &'a dyn ModuleTypeCatalog,
    pub tags: &'a TypeRegistry,
}

struct PreparedModule {
    kind: ModuleKind,
    module: Module,
    descriptors: EffectiveDescriptors,
}

impl Binder<'_> {
    pub(crate) fn bind(&self, rule: &Rule) -> Result<BoundModules, BindFailure> {
        let prepared = self.prepare(rule)?;
        let uid = rule.uid_str();

        let mut bound: Vec<BoundModule> = Vec::new();
        let mut missing: Vec<String> = Vec::new();
        let mut failed: Vec<String> = Vec::new();

        let order = [ModuleKind::Condition, ModuleKind::Action, ModuleKind::Trigger];
        for kind in order {
            for PreparedModule {
                module,
                descriptors,
                ..
            } in prepared.iter().filter(|p| p.kind == kind)
            {
                let factory = match self.registry.lookup_for_type(&module.type_uid) {
                    Ok(factory) => factory,
                    Err(e) => {
                        debug!(
                            rule_uid = %uid,
                            module = %module.id,
                            error = %e,
                            "No handler factory"
                        );
                        missing.push(format!("{} ({})", module.id, module.type_prefix()));
                        continue;
                    }
                };

                match factory.create_handler(module, kind, uid) {
                    Ok(handler) if handler.kind() == kind => {
                        trace!(rule_uid = %uid, module = %module.id, "Bound handler");
                        bound.push(BoundModule {
                            kind,
                            module: module.clone(),
                            descriptors: descriptors.clone(),
                            handler,
                            factory,
                            wiring: OnceLock::new(),
                        });
                    }
                    Ok(handler) => {
                        warn!(
                            rule_uid = %uid,
                            module = %module.id,
                            expected = %kind,
                            actual = %handler.kind(),
                            "Factory returned a handler of the wrong kind"
                        );
                        factory.dispose_handler(module, handler);
                        failed.push(module.id.clone());
                    }
                    Err(e) => {
                        warn!(
                            rule_uid = %uid,
                            module = %module.id,
                            error = %e,
                            "Handler creation failed"
                        );
                        failed.push(module.id.clone());
                    }
                }
            }
        }

        if missing.is_empty() && failed.is_empty() {
            return Ok(split(bound));
        }

        for module in bound.into_iter().rev() {
            module.factory.dispose_handler(&module.module, module.handler);
        }

        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing handlers for {}", missing.join(", ")));
        }
        if !failed.is_empty() {
            parts.push(format!("handler initialization failed for {}", failed.join(", ")));
        }
        let detail = if missing.is_empty() {
            RuleStatusDetail::HandlerInitializingError
        } else {
            RuleStatusDetail::HandlerMissingError
        };

        Err(BindFailure {
            detail,
            description: parts.join("; "),
        })
    }

    /// Resolve configurations and validate connections
    fn prepare(&self, rule: &Rule) -> Result<Vec<PreparedModule>, BindFailure> {
        let rule_config = resolve_configuration(&rule.configuration, &rule.config_descriptions)
            .map_err(|e| BindFailure::configuration(format!("rule configuration: {}", e)))?;

        let mut prepared = Vec::new();
        let mut descriptor_map = HashMap::new();

        for (kind, module) in rule.modules() {
            let descriptors = EffectiveDescriptors::collect(self.types, &module.type_uid)
                .unwrap_or_else(|| {
                    debug!(
                        module = %module.id,
                        type_uid = %module.type_uid,
                        "Module type not in catalog"
                    );
                    EffectiveDescriptors::default()
                });

            let supplied = substitute_rule_config(&module.configuration, &rule_config);
            let configuration = resolve_configuration(&supplied, &descriptors.config).map_err(|e| {
                BindFailure::configuration(format!("module '{}': {}", module.id, e))
            })?;

            let mut module = module.clone();
            module.configuration = configuration;

            descriptor_map.insert(module.id.clone(), descriptors.clone());
            prepared.push(PreparedModule {
                kind,
                module,
                descriptors,
            });
        }

        validate_connections(rule, &descriptor_map, self.tags)
            .map_err(|e| BindFailure::configuration(e.to_string()))?;

        Ok(prepared)
    }
}

/// Release every handler of a bound rule, triggers first
pub(crate) fn dispose_modules(modules: &BoundModules) {
    let all = modules
        .triggers
        .iter()
        .chain(modules.actions.iter())
        .chain(modules.conditions.iter());
    for bound in all {
        bound.factory.dispose_handler(&bound.module, bound.handler.clone());
    }
}

fn split(bound: Vec<BoundModule>) -> BoundModules {
    let mut modules = BoundModules {
        triggers: Vec::new(),
        conditions: Vec::new(),
        actions: Vec::new(),
    };
    for module in bound {
        match module.kind {
            ModuleKind::Trigger => modules.triggers.push(module),
            ModuleKind::Condition => modules.conditions.push(module),
            ModuleKind::Action => modules.actions.push(module),
        }
    }
    modules
}

/// Replace `$name` values with the rule configuration value `name`
///
/// References to names the rule does not define are left untouched.
fn substitute_rule_config(
    configuration: &Configuration,
    rule_config: &Configuration,
) -> Configuration {
    configuration
        .iter()
        .map(|(name, value)| {
            let substituted = value
                .as_str()
                .and_then(parse_reference)
                .and_then(|target| rule_config.get(target))
                .cloned()
                .unwrap_or_else(|| value.clone());
            (name.clone(), substituted)
        })
        .collect()
}

/// Instantiate the modules of a template-based rule
///
/// The rule's configuration is resolved against the template's parameters,
/// and the template's modules, tags and parameters are copied in.
pub(crate) fn expand_template(
    rule: &Rule,
    templates: Option<&dyn TemplateCatalog>,
) -> Result<Rule, BindFailure> {
    let template_uid = rule.template_uid.as_deref().unwrap_or_default();
    let template = templates
        .and_then(|catalog| catalog.get_template(template_uid))
        .ok_or_else(|| {
            BindFailure::configuration(format!("template '{}' not found", template_uid))
        })?;

    let mut supplied = template.configuration.clone();
    supplied.extend(rule.configuration.clone());

    let configuration = resolve_configuration(&supplied, &template.config_descriptions)
        .map_err(|e| BindFailure::configuration(format!("template '{}': {}", template_uid, e)))?;

    let mut expanded = rule.clone();
    expanded.configuration = configuration;
    expanded.config_descriptions = template.config_descriptions;
    expanded.triggers = template.triggers;
    expanded.conditions = template.conditions;
    expanded.actions = template.actions;
    expanded.tags.extend(template.tags);
    if expanded.description.is_none() {
        expanded.description = template.description;
    }
    if expanded.name.is_none() {
        expanded.name = template.label;
    }

    debug!(rule_uid = %rule.uid_str(), template = %template_uid, "Expanded rule template");
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitute_rule_config() {
        let module_config: Configuration = [
            ("room".to_string(), json!("$room")),
            ("level".to_string(), json!(5)),
            ("other".to_string(), json!("$undefined")),
        ]
        .into_iter()
        .collect();
        let rule_config: Configuration =
            [("room".to_string(), json!("kitchen"))].into_iter().collect();

        let substituted = substitute_rule_config(&module_config, &rule_config);

        assert_eq!(substituted["room"], json!("kitchen"));
        assert_eq!(substituted["level"], json!(5));
        assert_eq!(substituted["other"], json!("$undefined"));
    }
}

//! Configuration resolution
//!
//! For each declared parameter the value is, in order of preference:
//!
//! 1. the supplied value
//! 2. the value of the parameter named by its `context` reference
//! 3. its `default`, dereferenced when the default is itself a reference,
//!    otherwise converted to the declared type
//!
//! Every parameter visited on the chain that produced a value receives that
//! same value.

use rule_core::{parse_reference, ConfigDescriptor, Configuration};
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::{ResolveError, ResolveResult};

/// Resolve `supplied` against `descriptors`
///
/// The result holds every supplied value plus each resolved parameter.
/// A reference between parameters of different declared types is a
/// [`ResolveError::TypeMismatch`]; a reference to an unknown parameter or a
/// reference cycle is a [`ResolveError::UnresolvedReference`].
pub fn resolve_configuration(
    supplied: &Configuration,
    descriptors: &[ConfigDescriptor],
) -> ResolveResult<Configuration> {
    let mut resolver = ConfigResolver {
        supplied,
        descriptors,
        resolved: Configuration::new(),
    };

    for descriptor in descriptors {
        let name = &descriptor.name;
        if supplied.contains_key(name) || resolver.resolved.contains_key(name) {
            continue;
        }

        let mut visiting = Vec::new();
        if let Some((value, path)) = resolver.resolve(&descriptor.name, &mut visiting)? {
            trace!(parameter = %descriptor.name, ?path, "Resolved configuration chain");
            for name in path {
                resolver.resolved.entry(name).or_insert_with(|| value.clone());
            }
        } else if descriptor.required {
            debug!(parameter = %descriptor.name, "Required parameter left without a value");
        }
    }

    let mut result = supplied.clone();
    for (name, value) in resolver.resolved {
        result.entry(name).or_insert(value);
    }
    Ok(result)
}

struct ConfigResolver<'a> {
    supplied: &'a Configuration,
    descriptors: &'a [ConfigDescriptor],
    resolved: Configuration,
}

impl ConfigResolver<'_> {
    fn descriptor(&self, name: &str) -> Option<&ConfigDescriptor> {
        self.descriptors.iter().find(|d| d.name == name)
    }

    /// Resolve one parameter, returning the value and the names that
    /// still need it assigned
    fn resolve(
        &self,
        name: &str,
        visiting: &mut Vec<String>,
    ) -> ResolveResult<Option<(Value, Vec<String>)>> {
        if let Some(value) = self.supplied.get(name).or_else(|| self.resolved.get(name)) {
            return Ok(Some((value.clone(), Vec::new())));
        }

        if visiting.iter().any(|visited| visited == name) {
            return Err(ResolveError::unresolved(
                visiting.first().cloned().unwrap_or_default(),
                format!("${}", name),
                format!("reference cycle {} -> {}", visiting.join(" -> "), name),
            ));
        }

        let descriptor = match self.descriptor(name) {
            Some(descriptor) => descriptor,
            None => {
                return Err(ResolveError::unresolved(
                    visiting.last().cloned().unwrap_or_default(),
                    format!("${}", name),
                    "no such parameter",
                ))
            }
        };

        visiting.push(name.to_string());

        let mut found = None;
        if let Some(target) = descriptor.context.as_deref().and_then(parse_reference) {
            self.check_types(descriptor, target)?;
            found = self.resolve(target, visiting)?;
        }

        if found.is_none() {
            if let Some(default) = descriptor.default.as_deref() {
                found = match parse_reference(default) {
                    Some(target) => {
                        self.check_types(descriptor, target)?;
                        self.resolve(target, visiting)?
                    }
                    None => descriptor
                        .config_type
                        .convert(default)
                        .map(|value| (value, Vec::new())),
                };
            }
        }

        visiting.pop();

        Ok(found.map(|(value, mut path)| {
            path.push(name.to_string());
            (value, path)
        }))
    }

    fn check_types(&self, from: &ConfigDescriptor, target: &str) -> ResolveResult<()> {
        match self.descriptor(target) {
            Some(to) if to.config_type != from.config_type => Err(ResolveError::TypeMismatch {
                source_name: target.to_string(),
                source_type: format!("{:?}", to.config_type),
                target_name: from.name.clone(),
                target_type: format!("{:?}", from.config_type),
            }),
            _ => Ok(()),
        }
    }
}

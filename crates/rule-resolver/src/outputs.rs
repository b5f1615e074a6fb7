//! Output resolution
//!
//! Handlers produce the "system" outputs. Declared outputs carrying a
//! `$name` reference are filled in by following the chain until an output
//! that already has a value; that value is then assigned to every output
//! visited on the way. Failures affect only the output being resolved.

use rule_core::{parse_reference, Output, Values};
use tracing::debug;

use crate::error::ResolveError;
use crate::types::TypeRegistry;

/// Resolved outputs plus the per-output failures
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputResolution {
    pub values: Values,
    pub errors: Vec<ResolveError>,
}

/// Fill in every declared output not already present in `system`
pub fn resolve_outputs(
    system: Values,
    declared: &[Output],
    types: &TypeRegistry,
) -> OutputResolution {
    let mut resolution = OutputResolution {
        values: system,
        errors: Vec::new(),
    };

    for output in declared {
        if resolution.values.contains_key(&output.name) || output.reference.is_none() {
            continue;
        }

        match follow_chain(output, declared, &resolution.values, types) {
            Ok((value, path)) => {
                for name in path {
                    resolution.values.entry(name).or_insert_with(|| value.clone());
                }
            }
            Err(err) => {
                debug!(output = %output.name, error = %err, "Output left unresolved");
                resolution.errors.push(err);
            }
        }
    }

    resolution
}

fn follow_chain(
    output: &Output,
    declared: &[Output],
    values: &Values,
    types: &TypeRegistry,
) -> Result<(serde_json::Value, Vec<String>), ResolveError> {
    let mut path = vec![output.name.clone()];
    let mut current = output;

    loop {
        let reference = match current.reference.as_deref() {
            Some(reference) => reference,
            None => {
                return Err(ResolveError::unresolved(
                    &output.name,
                    &current.name,
                    "chain ends without a value",
                ))
            }
        };

        let target_name = parse_reference(reference).ok_or_else(|| {
            ResolveError::unresolved(&current.name, reference, "malformed reference")
        })?;

        let target = declared.iter().find(|o| o.name == target_name);

        if let Some(target) = target {
            if !types.is_compatible(&target.value_type, &current.value_type) {
                return Err(ResolveError::TypeMismatch {
                    source_name: target.name.clone(),
                    source_type: target.value_type.clone(),
                    target_name: current.name.clone(),
                    target_type: current.value_type.clone(),
                });
            }
        }

        if let Some(value) = values.get(target_name) {
            return Ok((value.clone(), path));
        }

        let target = target.ok_or_else(|| {
            ResolveError::unresolved(&current.name, reference, "no such output")
        })?;

        if path.iter().any(|visited| *visited == target.name) {
            return Err(ResolveError::unresolved(
                &output.name,
                reference,
                format!("reference cycle {} -> {}", path.join(" -> "), target.name),
            ));
        }

        path.push(target.name.clone());
        current = target;
    }
}

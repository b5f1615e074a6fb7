//! Input references
//!
//! An input declaring `reference: "$other"` mirrors `other`: whatever value
//! reaches `other` also reaches it, directly or through a longer chain.

use rule_core::{parse_reference, Input, Values};
use std::collections::HashMap;
use tracing::{trace, warn};

/// For each referenced input, every input that points at it directly or
/// through a chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputRefs {
    refs: HashMap<String, Vec<String>>,
}

impl InputRefs {
    /// Build the reference map for a set of declared inputs
    ///
    /// Broken, malformed or cyclic references are logged and the
    /// referencing input is left unresolved.
    pub fn resolve(inputs: &[Input]) -> Self {
        let mut refs: HashMap<String, Vec<String>> = HashMap::new();

        for input in inputs {
            let Some(reference) = input.reference.as_deref() else {
                continue;
            };

            match Self::chain(inputs, input, reference) {
                Ok(targets) => {
                    for target in targets {
                        let mirrors = refs.entry(target).or_default();
                        if !mirrors.contains(&input.name) {
                            mirrors.push(input.name.clone());
                        }
                    }
                }
                Err(reason) => {
                    warn!(input = %input.name, %reference, %reason, "Skipping input reference");
                }
            }
        }

        trace!(?refs, "Resolved input references");
        Self { refs }
    }

    /// Targets reached from `input`, nearest first
    fn chain(inputs: &[Input], input: &Input, reference: &str) -> Result<Vec<String>, String> {
        let mut targets: Vec<String> = Vec::new();
        let mut next = Some(reference);

        while let Some(reference) = next {
            let name = parse_reference(reference)
                .ok_or_else(|| format!("malformed reference '{}'", reference))?;

            if name == input.name || targets.iter().any(|t| t == name) {
                return Err(format!("reference cycle through '{}'", name));
            }

            let target = inputs
                .iter()
                .find(|i| i.name == name)
                .ok_or_else(|| format!("no input named '{}'", name))?;

            targets.push(target.name.clone());
            next = target.reference.as_deref();
        }

        Ok(targets)
    }

    /// Inputs that mirror `name`
    pub fn mirrors_of(&self, name: &str) -> &[String] {
        self.refs.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// Compute the effective inputs of a module
///
/// Declared defaults come first, then each directly supplied value is
/// broadcast to the inputs mirroring it, and finally direct values are
/// applied on top.
pub fn assemble_inputs(declared: &[Input], refs: &InputRefs, direct: &Values) -> Values {
    let mut inputs = Values::new();

    for input in declared {
        if let Some(default) = &input.default_value {
            inputs.insert(input.name.clone(), default.clone());
            for mirror in refs.mirrors_of(&input.name) {
                inputs.insert(mirror.clone(), default.clone());
            }
        }
    }

    for (name, value) in direct {
        for mirror in refs.mirrors_of(name) {
            inputs.insert(mirror.clone(), value.clone());
        }
    }

    for (name, value) in direct {
        inputs.insert(name.clone(), value.clone());
    }

    inputs
}

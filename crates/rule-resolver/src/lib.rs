//! Reference resolution for rule modules
//!
//! Module types declare configuration parameters, inputs and outputs that
//! may point at each other through `$name` references. This crate turns
//! those declarations into concrete values:
//!
//! - [`resolve_configuration`] - supplied values, `context` references and
//!   defaults, converted to the declared type
//! - [`InputRefs`] - which inputs mirror a given input, so one supplied
//!   value reaches every input in its chain
//! - [`resolve_outputs`] - custom outputs filled in from the values a
//!   handler produced
//!
//! All algorithms run over [`EffectiveDescriptors`], the union of a type's
//! declarations and those of its `:`-delimited ancestors.
//!
//! Reference chains are walked with a visited set; a cycle fails fast with
//! [`ResolveError::UnresolvedReference`].

mod config;
mod descriptors;
mod error;
mod inputs;
mod outputs;
mod types;

pub use config::resolve_configuration;
pub use descriptors::EffectiveDescriptors;
pub use error::{ResolveError, ResolveResult};
pub use inputs::{assemble_inputs, InputRefs};
pub use outputs::{resolve_outputs, OutputResolution};
pub use types::{TypeRegistry, ValueKind};

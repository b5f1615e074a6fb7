//! Core types for the rule engine
//!
//! This crate provides the in-memory model shared by every other crate:
//! modules and their connections, rules, rule status, and the read-only
//! module-type and template catalogs.
//!
//! # Architecture
//!
//! ```text
//! RULE = TRIGGERS → CONDITIONS → ACTIONS
//! ```
//!
//! - **Trigger**: produces outputs when its event source fires
//! - **Condition**: consumes inputs, yields a boolean verdict
//! - **Action**: consumes inputs, may produce outputs for later actions
//!
//! Values flowing between modules are plain `serde_json::Value`s.

mod catalog;
mod error;
mod module;
mod module_type;
mod rule;
mod status;

pub use catalog::{
    ModuleTypeCatalog, ModuleTypeRegistry, SharedModuleTypeCatalog, SharedTemplateCatalog,
    TemplateCatalog, TemplateRegistry,
};
pub use error::{ModelError, ModelResult};
pub use module::{
    parent_type_uid, type_prefix, Configuration, Connection, Module, ModuleKind, Values,
};
pub use module_type::{ConfigDescriptor, ConfigType, Input, ModuleType, Output, RuleTemplate};
pub use rule::Rule;
pub use status::{RuleStatus, RuleStatusDetail, RuleStatusInfo};

/// Separator of the module type UID hierarchy (`System:Custom`)
pub const TYPE_SEPARATOR: char = ':';

/// Prefix marking a `$name` reference in configuration values and descriptors
pub const REFERENCE_PREFIX: char = '$';

/// Extract the target name of a `$name` reference
///
/// Returns `None` for literals and for malformed references (empty name or
/// embedded whitespace).
pub fn parse_reference(value: &str) -> Option<&str> {
    let name = value.strip_prefix(REFERENCE_PREFIX)?;
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return None;
    }
    Some(name)
}

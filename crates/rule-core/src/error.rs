//! Errors raised while validating the rule model

use thiserror::Error;

/// Result type for model validation
pub type ModelResult<T> = Result<T, ModelError>;

/// Structural problems in a rule definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("module id must not be empty")]
    EmptyModuleId,

    #[error("duplicate module id '{0}'")]
    DuplicateModuleId(String),

    #[error("module '{module}' has an empty type UID")]
    EmptyTypeUid { module: String },

    #[error("trigger '{0}' cannot declare connections")]
    TriggerConnections(String),

    #[error("module '{module}' connects input '{input}' more than once")]
    DuplicateConnection { module: String, input: String },
}

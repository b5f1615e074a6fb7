//! Engine errors

use rule_core::ModelError;
use rule_handler_registry::{HandlerError, RegistryError};
use rule_resolver::ResolveError;
use rule_storage::StorageError;
use thiserror::Error;

/// Result type for engine and manager operations
pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Rule not found: {0}")]
    UnknownRule(String),

    #[error("Rule already exists: {0}")]
    DuplicateRule(String),

    #[error("Rule has no UID")]
    MissingUid,

    #[error("Invalid rule: {0}")]
    InvalidRule(#[from] ModelError),

    #[error(transparent)]
    MissingHandler(#[from] RegistryError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error(transparent)]
    Wiring(#[from] WiringError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A connection that cannot be wired
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WiringError {
    #[error("input '{input}' of '{module}' is connected to unknown module '{source_module}'")]
    UnknownSource {
        module: String,
        input: String,
        source_module: String,
    },

    #[error(
        "input '{input}' of '{module}' is connected to '{source_module}', \
         a {kind} that produces no outputs"
    )]
    NotASource {
        module: String,
        input: String,
        source_module: String,
        kind: String,
    },

    #[error(
        "input '{input}' of '{module}' ({input_type}) cannot take output \
         '{source_module}.{output}' ({output_type})"
    )]
    TypeMismatch {
        module: String,
        input: String,
        input_type: String,
        source_module: String,
        output: String,
        output_type: String,
    },
}

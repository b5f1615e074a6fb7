//! Resolution errors

use thiserror::Error;

/// Result type for resolution operations
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Errors raised while following `$name` references
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A reference joins two properties of incompatible declared types
    #[error(
        "type mismatch: '{source_name}' ({source_type}) cannot feed '{target_name}' ({target_type})"
    )]
    TypeMismatch {
        source_name: String,
        source_type: String,
        target_name: String,
        target_type: String,
    },

    /// A reference chain is broken, malformed, cyclic or ends without a value
    #[error("unresolved reference '{reference}' from '{name}': {reason}")]
    UnresolvedReference {
        name: String,
        reference: String,
        reason: String,
    },
}

impl ResolveError {
    pub(crate) fn unresolved(
        name: impl Into<String>,
        reference: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ResolveError::UnresolvedReference {
            name: name.into(),
            reference: reference.into(),
            reason: reason.into(),
        }
    }
}

//! Rule persistence
//!
//! The engine only needs get/put/remove by rule UID plus a full listing at
//! startup. Two implementations are provided:
//!
//! - [`MemoryRuleStorage`] keeps rules in a concurrent map
//! - [`JsonRuleStorage`] writes one versioned JSON record per rule

mod file;
mod memory;

pub use file::{JsonRuleStorage, StorageFile, RULE_MINOR_VERSION, RULE_VERSION};
pub use memory::MemoryRuleStorage;

use async_trait::async_trait;
use rule_core::Rule;
use std::sync::Arc;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule has no UID")]
    MissingUid,

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Migration required for {key}: from {from} to {to}")]
    MigrationRequired { key: String, from: u32, to: u32 },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Key-value persistence of rules by UID
#[async_trait]
pub trait RuleStorage: Send + Sync {
    async fn get(&self, uid: &str) -> StorageResult<Option<Rule>>;

    /// Insert or replace the record for `rule`, keyed by its UID
    async fn put(&self, rule: &Rule) -> StorageResult<()>;

    /// Returns whether a record was removed
    async fn remove(&self, uid: &str) -> StorageResult<bool>;

    /// Every stored rule, in no particular order
    async fn all(&self) -> StorageResult<Vec<Rule>>;
}

/// Thread-safe handle to a storage backend
pub type SharedRuleStorage = Arc<dyn RuleStorage>;

fn rule_uid(rule: &Rule) -> StorageResult<&str> {
    rule.uid.as_deref().ok_or(StorageError::MissingUid)
}

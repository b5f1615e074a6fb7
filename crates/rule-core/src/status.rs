//! Rule status reported by the engine

use serde::{Deserialize, Serialize};

/// Execution state of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    /// Handlers are not bound; the rule never fires
    NotInitialized,
    Disabled,
    /// Bound, with no queued trigger data
    Idle,
    /// A worker is draining the rule's queue
    Running,
}

/// Why a rule is in its current status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatusDetail {
    #[default]
    None,
    HandlerMissingError,
    HandlerInitializingError,
    ConfigurationError,
}

/// Status snapshot returned by `getStatus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStatusInfo {
    pub status: RuleStatus,

    #[serde(default)]
    pub detail: RuleStatusDetail,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RuleStatusInfo {
    pub fn new(status: RuleStatus) -> Self {
        Self {
            status,
            detail: RuleStatusDetail::None,
            description: None,
        }
    }

    pub fn with_detail(
        status: RuleStatus,
        detail: RuleStatusDetail,
        description: impl Into<String>,
    ) -> Self {
        Self {
            status,
            detail,
            description: Some(description.into()),
        }
    }
}

impl std::fmt::Display for RuleStatusInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.status)?;
        if self.detail != RuleStatusDetail::None {
            write!(f, " ({:?})", self.detail)?;
        }
        if let Some(description) = &self.description {
            write!(f, ": {}", description)?;
        }
        Ok(())
    }
}

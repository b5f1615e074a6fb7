//! Handler contracts consumed by the rule engine

use async_trait::async_trait;
use rule_core::{Module, ModuleKind, Values};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for handler calls
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Errors raised by handlers and their factories
#[derive(Debug, Clone, Error)]
pub enum HandlerError {
    /// `is_satisfied` or `execute` failed
    #[error("handler execution failed: {0}")]
    Execution(String),

    /// The factory could not build a handler for a module
    #[error("handler initialization failed: {0}")]
    Initialization(String),

    #[error("factory does not support module type '{0}'")]
    UnsupportedType(String),

    #[error("handler did not complete within {0:?}")]
    Timeout(Duration),

    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// Receives trigger events on behalf of one rule
///
/// Installed into every bound [`TriggerHandler`] of the rule.
pub trait RuleEngineCallback: Send + Sync {
    /// Report that `trigger` fired with the given raw outputs
    fn triggered(&self, trigger: &Module, outputs: Values);
}

/// Thread-safe handle to a rule callback
pub type SharedCallback = Arc<dyn RuleEngineCallback>;

/// Runtime side of a trigger module
pub trait TriggerHandler: Send + Sync {
    /// Install or clear the callback invoked whenever the event source fires
    fn set_callback(&self, callback: Option<SharedCallback>);

    fn dispose(&self) {}
}

/// Runtime side of a condition module
#[async_trait]
pub trait ConditionHandler: Send + Sync {
    async fn is_satisfied(&self, inputs: &Values) -> HandlerResult<bool>;

    fn dispose(&self) {}
}

/// Runtime side of an action module
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Run the action; returned outputs become visible to later actions
    async fn execute(&self, inputs: &Values) -> HandlerResult<Option<Values>>;

    fn dispose(&self) {}
}

/// A handler of any module kind
#[derive(Clone)]
pub enum ModuleHandler {
    Trigger(Arc<dyn TriggerHandler>),
    Condition(Arc<dyn ConditionHandler>),
    Action(Arc<dyn ActionHandler>),
}

impl ModuleHandler {
    pub fn kind(&self) -> ModuleKind {
        match self {
            ModuleHandler::Trigger(_) => ModuleKind::Trigger,
            ModuleHandler::Condition(_) => ModuleKind::Condition,
            ModuleHandler::Action(_) => ModuleKind::Action,
        }
    }

    pub fn dispose(&self) {
        match self {
            ModuleHandler::Trigger(h) => h.dispose(),
            ModuleHandler::Condition(h) => h.dispose(),
            ModuleHandler::Action(h) => h.dispose(),
        }
    }
}

impl std::fmt::Debug for ModuleHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ModuleHandler::{}", self.kind())
    }
}

/// Provider of handlers for one or more type prefixes
pub trait ModuleHandlerFactory: Send + Sync {
    /// Type prefixes this factory serves
    fn types(&self) -> Vec<String>;

    /// Build the handler for `module` of rule `rule_uid`
    ///
    /// The module carries its fully resolved configuration.
    fn create_handler(
        &self,
        module: &Module,
        kind: ModuleKind,
        rule_uid: &str,
    ) -> HandlerResult<ModuleHandler>;

    /// Release a handler previously returned by `create_handler`
    fn dispose_handler(&self, _module: &Module, handler: ModuleHandler) {
        handler.dispose();
    }
}

//! Module handler SPI and the handler factory registry
//!
//! Handlers are the runtime objects bound to modules: a trigger handler
//! reports events through a [`RuleEngineCallback`], a condition handler
//! answers [`ConditionHandler::is_satisfied`], and an action handler runs
//! [`ActionHandler::execute`].
//!
//! Handlers come from [`ModuleHandlerFactory`] providers that register in a
//! [`HandlerFactoryRegistry`] under a type prefix, the part of a module type
//! UID before the first `:`.

mod handler;
mod registry;

pub use handler::{
    ActionHandler, ConditionHandler, HandlerError, HandlerResult, ModuleHandler,
    ModuleHandlerFactory, RuleEngineCallback, SharedCallback, TriggerHandler,
};
pub use registry::{HandlerFactoryRegistry, RegistryError, RegistryResult, SharedHandlerRegistry};

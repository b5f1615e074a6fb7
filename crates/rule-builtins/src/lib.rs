//! Built-in module types and handlers
//!
//! The [`CoreHandlerFactory`] serves every module type under the `core`
//! prefix:
//!
//! - `core:EventTrigger` - fires on bus events of its `eventType`
//! - `core:CompareCondition` - compares its `input` against `right`
//! - `core:LogAction` - logs `message` with its inputs
//! - `core:PublishEventAction` - publishes its `payload` input on the bus
//!
//! [`module_types`] declares their configuration, inputs and outputs for a
//! module type catalog.

mod actions;
mod compare;
mod event_trigger;
mod factory;
mod types;

pub use actions::{LogAction, PublishEventAction};
pub use compare::{CompareCondition, Operator};
pub use event_trigger::EventTrigger;
pub use factory::CoreHandlerFactory;
pub use types::{
    module_types, COMPARE_CONDITION, EVENT_TRIGGER, LOG_ACTION, PUBLISH_EVENT_ACTION,
};

/// Type prefix served by [`CoreHandlerFactory`]
pub const CORE_PREFIX: &str = "core";

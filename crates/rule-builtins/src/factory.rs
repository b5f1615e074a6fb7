//! Handler factory for the `core:` prefix

use rule_core::{parent_type_uid, Module, ModuleKind};
use rule_event_bus::SharedEventBus;
use rule_handler_registry::{HandlerError, HandlerResult, ModuleHandler, ModuleHandlerFactory};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::debug;

use crate::actions::{required_text, LogAction, PublishEventAction};
use crate::compare::CompareCondition;
use crate::event_trigger::EventTrigger;
use crate::types::{COMPARE_CONDITION, EVENT_TRIGGER, LOG_ACTION, PUBLISH_EVENT_ACTION};
use crate::CORE_PREFIX;

/// Creates the built-in handlers
///
/// Custom types refining a built-in (`core:EventTrigger:Motion`) get the
/// handler of their nearest built-in ancestor.
pub struct CoreHandlerFactory {
    bus: SharedEventBus,
    runtime: Handle,
}

impl CoreHandlerFactory {
    /// Event triggers listen on tasks spawned on `runtime`
    pub fn new(bus: SharedEventBus, runtime: Handle) -> Self {
        Self { bus, runtime }
    }
}

impl ModuleHandlerFactory for CoreHandlerFactory {
    fn types(&self) -> Vec<String> {
        vec![CORE_PREFIX.to_string()]
    }

    fn create_handler(
        &self,
        module: &Module,
        kind: ModuleKind,
        rule_uid: &str,
    ) -> HandlerResult<ModuleHandler> {
        let builtin = builtin_type(&module.type_uid)
            .ok_or_else(|| HandlerError::UnsupportedType(module.type_uid.clone()))?;
        debug!(rule_uid, module = %module.id, %builtin, %kind, "Creating built-in handler");

        let handler = match builtin {
            EVENT_TRIGGER => {
                let event_type = required_text(module, "eventType")?;
                ModuleHandler::Trigger(Arc::new(EventTrigger::new(
                    module,
                    event_type,
                    self.bus.clone(),
                    self.runtime.clone(),
                )))
            }
            COMPARE_CONDITION => {
                ModuleHandler::Condition(Arc::new(CompareCondition::from_module(module)?))
            }
            LOG_ACTION => ModuleHandler::Action(Arc::new(LogAction::new(module, rule_uid))),
            PUBLISH_EVENT_ACTION => ModuleHandler::Action(Arc::new(PublishEventAction::new(
                module,
                rule_uid,
                self.bus.clone(),
            )?)),
            _ => return Err(HandlerError::UnsupportedType(module.type_uid.clone())),
        };
        Ok(handler)
    }
}

/// The built-in type `type_uid` is or refines
fn builtin_type(type_uid: &str) -> Option<&'static str> {
    let mut current = Some(type_uid);
    while let Some(uid) = current {
        let found = [EVENT_TRIGGER, COMPARE_CONDITION, LOG_ACTION, PUBLISH_EVENT_ACTION]
            .into_iter()
            .find(|builtin| *builtin == uid);
        if found.is_some() {
            return found;
        }
        current = parent_type_uid(uid);
    }
    None
}

//! Built-in actions

use async_trait::async_trait;
use rule_core::{Module, Values};
use rule_event_bus::{Event, SharedEventBus};
use rule_handler_registry::{ActionHandler, HandlerError, HandlerResult};
use serde_json::{json, Value};
use tracing::{debug, info};

const DEFAULT_MESSAGE: &str = "rule fired";

/// Logs a message with the action's inputs
pub struct LogAction {
    rule_uid: String,
    module_id: String,
    message: String,
}

impl LogAction {
    pub fn new(module: &Module, rule_uid: &str) -> Self {
        let message = module
            .configuration
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_MESSAGE)
            .to_string();
        Self {
            rule_uid: rule_uid.to_string(),
            module_id: module.id.clone(),
            message,
        }
    }
}

#[async_trait]
impl ActionHandler for LogAction {
    async fn execute(&self, inputs: &Values) -> HandlerResult<Option<Values>> {
        info!(
            rule_uid = %self.rule_uid,
            module = %self.module_id,
            inputs = ?inputs,
            "{}",
            self.message
        );
        Ok(Some(Values::from([(
            "message".to_string(),
            json!(self.message),
        )])))
    }
}

/// Publishes its `payload` input on the event bus
pub struct PublishEventAction {
    rule_uid: String,
    event_type: String,
    bus: SharedEventBus,
}

impl PublishEventAction {
    pub fn new(module: &Module, rule_uid: &str, bus: SharedEventBus) -> HandlerResult<Self> {
        let event_type = required_text(module, "eventType")?;
        Ok(Self {
            rule_uid: rule_uid.to_string(),
            event_type,
            bus,
        })
    }
}

#[async_trait]
impl ActionHandler for PublishEventAction {
    async fn execute(&self, inputs: &Values) -> HandlerResult<Option<Values>> {
        let payload = inputs.get("payload").cloned().unwrap_or(Value::Null);
        let receivers = self
            .bus
            .fire(Event::new(&self.event_type, payload).with_source(&self.rule_uid));
        debug!(
            rule_uid = %self.rule_uid,
            event_type = %self.event_type,
            receivers,
            "Published event"
        );
        Ok(None)
    }
}

/// A non-empty text configuration value
pub(crate) fn required_text(module: &Module, name: &str) -> HandlerResult<String> {
    module
        .configuration
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            HandlerError::Initialization(format!("'{}' requires a '{}' value", module.id, name))
        })
}

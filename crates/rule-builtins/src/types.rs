//! Declarations of the built-in module types

use rule_core::{ConfigDescriptor, ConfigType, Input, ModuleKind, ModuleType, Output};

pub const EVENT_TRIGGER: &str = "core:EventTrigger";
pub const COMPARE_CONDITION: &str = "core:CompareCondition";
pub const LOG_ACTION: &str = "core:LogAction";
pub const PUBLISH_EVENT_ACTION: &str = "core:PublishEventAction";

/// Every built-in module type, ready for a module type catalog
pub fn module_types() -> Vec<ModuleType> {
    vec![
        ModuleType::new(EVENT_TRIGGER, ModuleKind::Trigger)
            .with_label("Event trigger")
            .with_config(ConfigDescriptor::new("eventType", ConfigType::Text).required())
            .with_output(Output::new("event_type", "text"))
            .with_output(Output::new("payload", "any")),
        ModuleType::new(COMPARE_CONDITION, ModuleKind::Condition)
            .with_label("Compare a value")
            .with_config(ConfigDescriptor::new("operator", ConfigType::Text).with_default("="))
            .with_config(ConfigDescriptor::new("right", ConfigType::Text))
            .with_input(Input::new("input", "any")),
        ModuleType::new(LOG_ACTION, ModuleKind::Action)
            .with_label("Log a message")
            .with_config(
                ConfigDescriptor::new("message", ConfigType::Text).with_default("rule fired"),
            )
            .with_input(Input::new("payload", "any"))
            .with_output(Output::new("message", "text")),
        ModuleType::new(PUBLISH_EVENT_ACTION, ModuleKind::Action)
            .with_label("Publish an event")
            .with_config(ConfigDescriptor::new("eventType", ConfigType::Text).required())
            .with_input(Input::new("payload", "any")),
    ]
}

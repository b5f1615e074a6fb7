//! Built-in handlers driven by a real engine

use rule_builtins::{module_types, CoreHandlerFactory};
use rule_core::{Module, ModuleTypeRegistry, Rule, RuleStatus, RuleStatusDetail};
use rule_engine::RuleEngine;
use rule_event_bus::{Event, EventBus, SharedEventBus};
use rule_handler_registry::HandlerFactoryRegistry;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

fn engine(bus: &SharedEventBus) -> RuleEngine {
    let catalog = Arc::new(ModuleTypeRegistry::new());
    catalog.extend(module_types());

    let engine = RuleEngine::new(catalog, Arc::new(HandlerFactoryRegistry::new()));
    engine.add_handler_factory(Arc::new(CoreHandlerFactory::new(bus.clone(), Handle::current())));
    engine
}

/// motion event → level above threshold → publish "lights_on" with the payload
fn threshold_rule() -> Rule {
    Rule::new(
        vec![Module::new("motion", "core:EventTrigger").with_config("eventType", json!("motion"))],
        vec![Module::new("bright_enough", "core:CompareCondition")
            .with_config("operator", json!(">"))
            .with_config("right", json!("$threshold"))
            .with_connection("input", "motion", "payload")],
        vec![Module::new("announce", "core:PublishEventAction")
            .with_config("eventType", json!("lights_on"))
            .with_connection("payload", "motion", "payload")],
    )
    .with_uid("threshold")
    .with_config("threshold", json!("5"))
}

#[tokio::test]
async fn test_event_to_published_event() {
    let bus: SharedEventBus = Arc::new(EventBus::new());
    let engine = engine(&bus);
    engine.register(threshold_rule()).unwrap();
    assert_eq!(engine.status("threshold").unwrap().status, RuleStatus::Idle);

    let mut lights = bus.subscribe("lights_on");

    bus.fire(Event::new("motion", json!(3)));
    bus.fire(Event::new("motion", json!(8)));

    let published = tokio::time::timeout(Duration::from_secs(2), lights.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(published.payload, json!(8));
    assert_eq!(published.source.as_deref(), Some("threshold"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(lights.try_recv().is_err());
}

#[tokio::test]
async fn test_disabled_rule_stops_listening() {
    let bus: SharedEventBus = Arc::new(EventBus::new());
    let engine = engine(&bus);
    engine.register(threshold_rule()).unwrap();
    let mut lights = bus.subscribe("lights_on");

    engine.set_enabled("threshold", false).unwrap();
    tokio::task::yield_now().await;

    bus.fire(Event::new("motion", json!(9)));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(lights.try_recv().is_err());
}

#[tokio::test]
async fn test_missing_event_type_fails_initialization() {
    let bus: SharedEventBus = Arc::new(EventBus::new());
    let engine = engine(&bus);

    let rule = Rule::new(
        vec![Module::new("t", "core:EventTrigger")],
        vec![],
        vec![Module::new("log", "core:LogAction")],
    )
    .with_uid("broken");
    engine.register(rule).unwrap();

    let status = engine.status("broken").unwrap();
    assert_eq!(status.status, RuleStatus::NotInitialized);
    assert_eq!(status.detail, RuleStatusDetail::HandlerInitializingError);
}

#[tokio::test]
async fn test_log_action_output_is_published() {
    let bus: SharedEventBus = Arc::new(EventBus::new());
    let engine = engine(&bus);

    let rule = Rule::new(
        vec![Module::new("door", "core:EventTrigger").with_config("eventType", json!("door"))],
        vec![],
        vec![Module::new("log", "core:LogAction")],
    )
    .with_uid("logger");
    engine.register(rule).unwrap();

    bus.fire(Event::new("door", json!({"open": true})));

    let mut outputs = None;
    for _ in 0..200 {
        outputs = engine.module_outputs("logger", "log");
        if outputs.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(outputs.unwrap()["message"], json!("rule fired"));
    assert_eq!(
        engine.module_outputs("logger", "door").unwrap()["event_type"],
        json!("door")
    );
}

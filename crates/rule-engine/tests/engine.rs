//! End-to-end tests of binding and trigger processing

mod common;

use common::*;
use rule_core::{
    ConfigDescriptor, ConfigType, Input, Module, ModuleKind, ModuleType, ModuleTypeRegistry,
    Output, Rule, RuleStatus, RuleStatusDetail, RuleTemplate, TemplateRegistry,
};
use rule_engine::{EngineError, RuleEngine};
use rule_handler_registry::{HandlerError, HandlerFactoryRegistry, ModuleHandlerFactory};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn level_rule(uid: &str) -> Rule {
    Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![Module::new("c", "test:Condition").with_connection("level", "t", "level")],
        vec![Module::new("a", "test:Action").with_connection("level", "t", "level")],
    )
    .with_uid(uid)
}

#[tokio::test]
async fn test_trigger_condition_action_end_to_end() {
    let factory = MockFactory::new("test");
    factory.on_condition("c", |inputs| {
        Ok(inputs.get("level").and_then(|v| v.as_i64()).unwrap_or(0) > 5)
    });
    factory.on_action("a", |inputs| {
        Ok(Some(values(&[("lastLevel", inputs["level"].clone())])))
    });
    let engine = engine_with(factory.clone());

    engine.register(level_rule("r1")).unwrap();
    assert_eq!(engine.status("r1").unwrap().status, RuleStatus::Idle);

    factory.trigger("r1", "t").fire(values(&[("level", json!(10))]));

    assert!(wait_until(|| factory.call_count("a") == 1).await);
    settle().await;

    let calls = factory.calls_for("a");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].inputs, values(&[("level", json!(10))]));
    assert_eq!(
        engine.module_outputs("r1", "a"),
        Some(values(&[("lastLevel", json!(10))]))
    );
    assert_eq!(
        engine.module_outputs("r1", "t"),
        Some(values(&[("level", json!(10))]))
    );
}

#[tokio::test]
async fn test_each_firing_replaces_trigger_outputs() {
    let factory = MockFactory::new("test");
    let engine = engine_with(factory.clone());
    let rule = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![],
        vec![Module::new("a", "test:Action")
            .with_connection("level", "t", "level")
            .with_connection("extra", "t", "extra")],
    )
    .with_uid("r1");
    engine.register(rule).unwrap();

    let trigger = factory.trigger("r1", "t");
    trigger.fire(values(&[("level", json!(10)), ("extra", json!(1))]));
    assert!(wait_until(|| factory.call_count("a") == 1).await);
    trigger.fire(values(&[("level", json!(3))]));
    assert!(wait_until(|| factory.call_count("a") == 2).await);

    let calls = factory.calls_for("a");
    assert_eq!(
        calls[0].inputs,
        values(&[("level", json!(10)), ("extra", json!(1))])
    );
    assert_eq!(calls[1].inputs, values(&[("level", json!(3))]));
    assert_eq!(
        engine.module_outputs("r1", "t"),
        Some(values(&[("level", json!(3))]))
    );
}

#[tokio::test]
async fn test_events_processed_in_arrival_order() {
    let factory = MockFactory::new("test");
    let engine = engine_with(factory.clone());
    engine.register(level_rule("r1")).unwrap();

    let trigger = factory.trigger("r1", "t");
    for i in 0..20 {
        trigger.fire(values(&[("level", json!(i))]));
    }

    assert!(wait_until(|| factory.call_count("a") == 20).await);
    let seen: Vec<i64> = factory
        .calls_for("a")
        .iter()
        .map(|c| c.inputs["level"].as_i64().unwrap())
        .collect();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_one_worker_per_rule_under_concurrent_firing() {
    let factory = MockFactory::new("test");
    factory.set_delay(Duration::from_millis(2));
    let engine = engine_with(factory.clone());
    engine.register(level_rule("r1")).unwrap();

    let trigger = factory.trigger("r1", "t");
    let mut sources = Vec::new();
    for source in 0..4 {
        let trigger = trigger.clone();
        sources.push(tokio::spawn(async move {
            for i in 0..5 {
                trigger.fire(values(&[("level", json!(source * 10 + i))]));
                tokio::task::yield_now().await;
            }
        }));
    }
    for source in sources {
        source.await.unwrap();
    }

    assert!(wait_until(|| factory.call_count("a") == 20).await);
    assert_eq!(factory.call_count("c"), 20);
    assert_eq!(factory.max_in_flight(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_different_rules_run_concurrently() {
    let factory = MockFactory::new("test");
    let gate = factory.set_gate();
    let engine = engine_with(factory.clone());
    engine.register(level_rule("r1")).unwrap();
    engine.register(level_rule("r2")).unwrap();

    factory.trigger("r1", "t").fire(values(&[("level", json!(1))]));
    factory.trigger("r2", "t").fire(values(&[("level", json!(2))]));

    // Both conditions are entered while neither has been released
    assert!(wait_until(|| factory.call_count("c") == 2).await);
    assert_eq!(engine.status("r1").unwrap().status, RuleStatus::Running);
    assert_eq!(engine.status("r2").unwrap().status, RuleStatus::Running);

    gate.add_permits(10);
    assert!(wait_until(|| factory.call_count("a") == 2).await);
    assert!(wait_until(|| engine.status("r1").unwrap().status == RuleStatus::Idle).await);
}

#[tokio::test]
async fn test_disable_discards_queued_events() {
    let factory = MockFactory::new("test");
    let gate = factory.set_gate();
    let engine = engine_with(factory.clone());
    engine.register(level_rule("r1")).unwrap();

    let trigger = factory.trigger("r1", "t");
    for i in 0..3 {
        trigger.fire(values(&[("level", json!(i))]));
    }
    assert!(wait_until(|| factory.call_count("c") == 1).await);

    engine.set_enabled("r1", false).unwrap();
    assert_eq!(engine.status("r1").unwrap().status, RuleStatus::Disabled);
    assert!(!trigger.has_callback());

    gate.add_permits(100);
    settle().await;

    // The event in flight finishes; the two queued behind it never reach a handler
    assert_eq!(factory.call_count("c"), 1);
    assert_eq!(factory.call_count("a"), 1);

    trigger.fire(values(&[("level", json!(9))]));
    settle().await;
    assert_eq!(factory.call_count("c"), 1);
}

#[tokio::test]
async fn test_re_enable_binds_again() {
    let factory = MockFactory::new("test");
    let engine = engine_with(factory.clone());
    engine.register(level_rule("r1")).unwrap();

    engine.set_enabled("r1", false).unwrap();
    engine.set_enabled("r1", true).unwrap();
    assert_eq!(engine.status("r1").unwrap().status, RuleStatus::Idle);

    factory.trigger("r1", "t").fire(values(&[("level", json!(1))]));
    assert!(wait_until(|| factory.call_count("a") == 1).await);
}

#[tokio::test]
async fn test_first_false_condition_short_circuits() {
    let factory = MockFactory::new("test");
    factory.on_condition("c1", |_| Ok(false));
    let engine = engine_with(factory.clone());

    let rule = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![
            Module::new("c1", "test:Condition"),
            Module::new("c2", "test:Condition"),
            Module::new("c3", "test:Condition"),
        ],
        vec![Module::new("a", "test:Action")],
    )
    .with_uid("r1");
    engine.register(rule).unwrap();

    factory.trigger("r1", "t").fire(values(&[]));

    assert!(wait_until(|| factory.call_count("c1") == 1).await);
    settle().await;
    assert_eq!(factory.call_count("c2"), 0);
    assert_eq!(factory.call_count("c3"), 0);
    assert_eq!(factory.call_count("a"), 0);
}

#[tokio::test]
async fn test_rule_without_conditions_runs_actions() {
    let factory = MockFactory::new("test");
    let engine = engine_with(factory.clone());
    let rule = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![],
        vec![Module::new("a", "test:Action")],
    )
    .with_uid("r1");
    engine.register(rule).unwrap();

    factory.trigger("r1", "t").fire(values(&[]));
    assert!(wait_until(|| factory.call_count("a") == 1).await);
}

#[tokio::test]
async fn test_failing_action_aborts_only_that_event() {
    let factory = MockFactory::new("test");
    factory.on_action("a1", |inputs| {
        if inputs["level"] == json!(1) {
            Err(HandlerError::Execution("device offline".into()))
        } else {
            Ok(None)
        }
    });
    let engine = engine_with(factory.clone());
    let rule = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![],
        vec![
            Module::new("a1", "test:Action").with_connection("level", "t", "level"),
            Module::new("a2", "test:Action").with_connection("level", "t", "level"),
        ],
    )
    .with_uid("r1");
    engine.register(rule).unwrap();

    let trigger = factory.trigger("r1", "t");
    trigger.fire(values(&[("level", json!(1))]));
    trigger.fire(values(&[("level", json!(2))]));

    assert!(wait_until(|| factory.call_count("a2") == 1).await);
    assert_eq!(factory.call_count("a1"), 2);
    assert_eq!(factory.calls_for("a2")[0].inputs["level"], json!(2));
}

#[tokio::test]
async fn test_panicking_condition_does_not_kill_the_worker() {
    let factory = MockFactory::new("test");
    factory.on_condition("c", |inputs| {
        if inputs["level"] == json!(0) {
            panic!("sensor exploded");
        }
        Ok(true)
    });
    let engine = engine_with(factory.clone());
    engine.register(level_rule("r1")).unwrap();

    let trigger = factory.trigger("r1", "t");
    trigger.fire(values(&[("level", json!(0))]));
    trigger.fire(values(&[("level", json!(3))]));

    assert!(wait_until(|| factory.call_count("a") == 1).await);
    assert_eq!(factory.calls_for("a")[0].inputs["level"], json!(3));
}

#[tokio::test]
async fn test_action_outputs_feed_later_actions() {
    let factory = MockFactory::new("test");
    factory.on_action("double", |inputs| {
        let level = inputs["level"].as_i64().unwrap_or(0);
        Ok(Some(values(&[("doubled", json!(level * 2))])))
    });
    let engine = engine_with(factory.clone());
    let rule = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![],
        vec![
            Module::new("double", "test:Action").with_connection("level", "t", "level"),
            Module::new("report", "test:Action").with_connection("value", "double", "doubled"),
        ],
    )
    .with_uid("r1");
    engine.register(rule).unwrap();

    factory.trigger("r1", "t").fire(values(&[("level", json!(10))]));

    assert!(wait_until(|| factory.call_count("report") == 1).await);
    assert_eq!(
        factory.calls_for("report")[0].inputs,
        values(&[("value", json!(20))])
    );
}

#[tokio::test]
async fn test_declared_output_references_and_input_defaults() {
    let factory = MockFactory::new("test");
    let catalog = Arc::new(ModuleTypeRegistry::new());
    catalog.add(
        ModuleType::new("test:Trigger", ModuleKind::Trigger)
            .with_output(Output::new("level", "integer"))
            .with_output(Output::new("copy", "integer").with_reference("$level")),
    );
    catalog.add(
        ModuleType::new("test:Action", ModuleKind::Action)
            .with_input(Input::new("value", "number"))
            .with_input(Input::new("mirror", "number").with_reference("$value"))
            .with_input(Input::new("step", "integer").with_default(json!(1))),
    );
    let engine = engine_with_catalog(factory.clone(), catalog);

    let rule = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![],
        vec![Module::new("a", "test:Action").with_connection("value", "t", "copy")],
    )
    .with_uid("r1");
    engine.register(rule).unwrap();

    factory.trigger("r1", "t").fire(values(&[("level", json!(10))]));

    assert!(wait_until(|| factory.call_count("a") == 1).await);
    assert_eq!(
        factory.calls_for("a")[0].inputs,
        values(&[("value", json!(10)), ("mirror", json!(10)), ("step", json!(1))])
    );
    assert_eq!(
        engine.module_outputs("r1", "t"),
        Some(values(&[("level", json!(10)), ("copy", json!(10))]))
    );
}

#[tokio::test]
async fn test_missing_factory_then_arrival() {
    let factory = MockFactory::new("test");
    let engine = engine_with(factory.clone());

    let rule = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![],
        vec![Module::new("switch", "zwave:Switch")],
    )
    .with_uid("r1");
    engine.register(rule).unwrap();

    let status = engine.status("r1").unwrap();
    assert_eq!(status.status, RuleStatus::NotInitialized);
    assert_eq!(status.detail, RuleStatusDetail::HandlerMissingError);
    assert!(status.description.unwrap().contains("switch"));
    // The trigger that did bind was released again
    assert_eq!(factory.disposed(), vec!["t".to_string()]);

    let zwave = MockFactory::new("zwave");
    let accepted = engine.add_handler_factory(zwave.clone());
    assert_eq!(accepted, vec!["zwave".to_string()]);
    assert_eq!(engine.status("r1").unwrap().status, RuleStatus::Idle);

    factory.trigger("r1", "t").fire(values(&[]));
    assert!(wait_until(|| zwave.call_count("switch") == 1).await);
}

#[tokio::test]
async fn test_handler_creation_failure_releases_bound_handlers() {
    let factory = MockFactory::new("test");
    factory.fail_creation("a");
    let engine = engine_with(factory.clone());

    engine.register(level_rule("r1")).unwrap();

    let status = engine.status("r1").unwrap();
    assert_eq!(status.status, RuleStatus::NotInitialized);
    assert_eq!(status.detail, RuleStatusDetail::HandlerInitializingError);
    // Handlers bound before and after the failing action are released in reverse order
    assert_eq!(factory.disposed(), vec!["t".to_string(), "c".to_string()]);
}

#[tokio::test]
async fn test_duplicate_registration_is_first_wins() {
    let first = MockFactory::new("test");
    let second = MockFactory::new("test");
    let engine = engine_with(first.clone());

    assert!(engine.add_handler_factory(second.clone()).is_empty());
    engine.register(level_rule("r1")).unwrap();

    first.trigger("r1", "t").fire(values(&[("level", json!(1))]));
    assert!(wait_until(|| first.call_count("a") == 1).await);
    assert_eq!(second.call_count("a"), 0);
}

#[tokio::test]
async fn test_removed_factory_keeps_bound_rules() {
    let factory = MockFactory::new("test");
    let engine = engine_with(factory.clone());
    engine.register(level_rule("r1")).unwrap();

    let as_factory: Arc<dyn ModuleHandlerFactory> = factory.clone();
    assert_eq!(engine.remove_handler_factory(&as_factory), vec!["test".to_string()]);
    assert_eq!(engine.status("r1").unwrap().status, RuleStatus::Idle);

    factory.trigger("r1", "t").fire(values(&[("level", json!(1))]));
    assert!(wait_until(|| factory.call_count("a") == 1).await);

    // A rule added afterwards cannot bind
    engine.register(level_rule("r2")).unwrap();
    assert_eq!(
        engine.status("r2").unwrap().detail,
        RuleStatusDetail::HandlerMissingError
    );
}

#[tokio::test]
async fn test_connection_errors_are_configuration_errors() {
    let factory = MockFactory::new("test");
    let engine = engine_with(factory.clone());

    let unknown_source = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![],
        vec![Module::new("a", "test:Action").with_connection("level", "ghost", "level")],
    )
    .with_uid("r1");
    engine.register(unknown_source).unwrap();

    let condition_source = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![Module::new("c", "test:Condition")],
        vec![Module::new("a", "test:Action").with_connection("level", "c", "verdict")],
    )
    .with_uid("r2");
    engine.register(condition_source).unwrap();

    for uid in ["r1", "r2"] {
        let status = engine.status(uid).unwrap();
        assert_eq!(status.status, RuleStatus::NotInitialized);
        assert_eq!(status.detail, RuleStatusDetail::ConfigurationError);
    }
    assert!(factory.created().is_empty());
}

#[tokio::test]
async fn test_incompatible_connection_types() {
    let factory = MockFactory::new("test");
    let catalog = Arc::new(ModuleTypeRegistry::new());
    catalog.add(
        ModuleType::new("test:Trigger", ModuleKind::Trigger)
            .with_output(Output::new("name", "text")),
    );
    catalog.add(
        ModuleType::new("test:Action", ModuleKind::Action)
            .with_input(Input::new("level", "integer")),
    );
    let engine = engine_with_catalog(factory, catalog);

    let rule = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![],
        vec![Module::new("a", "test:Action").with_connection("level", "t", "name")],
    )
    .with_uid("r1");
    engine.register(rule).unwrap();

    let status = engine.status("r1").unwrap();
    assert_eq!(status.detail, RuleStatusDetail::ConfigurationError);
    assert!(status.description.unwrap().contains("level"));
}

#[tokio::test]
async fn test_configuration_cycle_is_isolated_to_its_rule() {
    let factory = MockFactory::new("test");
    let catalog = Arc::new(ModuleTypeRegistry::new());
    catalog.add(
        ModuleType::new("test:Looping", ModuleKind::Action)
            .with_config(ConfigDescriptor::new("a", ConfigType::Text).with_context("$b"))
            .with_config(ConfigDescriptor::new("b", ConfigType::Text).with_context("$a")),
    );
    let engine = engine_with_catalog(factory.clone(), catalog);

    let looping = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![],
        vec![Module::new("a", "test:Looping")],
    )
    .with_uid("looping");
    engine.register(looping).unwrap();
    engine.register(level_rule("healthy")).unwrap();

    let status = engine.status("looping").unwrap();
    assert_eq!(status.status, RuleStatus::NotInitialized);
    assert_eq!(status.detail, RuleStatusDetail::ConfigurationError);
    assert!(status.description.unwrap().contains("cycle"));

    assert_eq!(engine.status("healthy").unwrap().status, RuleStatus::Idle);
    factory.trigger("healthy", "t").fire(values(&[("level", json!(4))]));
    assert!(wait_until(|| factory.call_count("a") == 1).await);
}

#[tokio::test]
async fn test_module_configuration_resolved_before_binding() {
    let factory = MockFactory::new("test");
    let catalog = Arc::new(ModuleTypeRegistry::new());
    catalog.add(ModuleType::new("test:Action", ModuleKind::Action).with_config(
        ConfigDescriptor::new("brightness", ConfigType::Integer).with_default("40"),
    ));
    catalog.add(
        ModuleType::new("test:Action:Dimmer", ModuleKind::Action)
            .with_config(ConfigDescriptor::new("room", ConfigType::Text).with_context("$area")),
    );
    let engine = engine_with_catalog(factory.clone(), catalog);

    let rule = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![],
        vec![Module::new("dim", "test:Action:Dimmer")
            .with_config("area", json!("$location"))],
    )
    .with_uid("r1")
    .with_config("location", json!("porch"));
    engine.register(rule).unwrap();

    let dim = factory
        .created()
        .into_iter()
        .find(|m| m.id == "dim")
        .unwrap();
    assert_eq!(dim.configuration["area"], json!("porch"));
    assert_eq!(dim.configuration["room"], json!("porch"));
    assert_eq!(dim.configuration["brightness"], json!(40));
}

#[tokio::test]
async fn test_rule_from_template() {
    let factory = MockFactory::new("test");
    let templates = Arc::new(TemplateRegistry::new());
    templates.add(RuleTemplate {
        uid: "threshold".into(),
        label: Some("Threshold alert".into()),
        description: None,
        tags: ["alerts".to_string()].into_iter().collect(),
        config_descriptions: vec![
            ConfigDescriptor::new("limit", ConfigType::Integer).with_default("5"),
        ],
        triggers: vec![Module::new("t", "test:Trigger")],
        conditions: vec![Module::new("c", "test:Condition").with_config("limit", json!("$limit"))],
        actions: vec![Module::new("a", "test:Action")],
        configuration: Default::default(),
    });

    let engine = RuleEngine::builder(
        Arc::new(ModuleTypeRegistry::new()),
        Arc::new(HandlerFactoryRegistry::new()),
    )
    .with_templates(templates)
    .build();
    engine.add_handler_factory(factory.clone());

    let rule = Rule::from_template("threshold", Default::default()).with_uid("r1");
    let stored = engine.register(rule).unwrap();

    assert_eq!(stored.triggers.len(), 1);
    assert!(stored.tags.contains("alerts"));
    assert_eq!(stored.name.as_deref(), Some("Threshold alert"));
    assert_eq!(engine.status("r1").unwrap().status, RuleStatus::Idle);

    let condition = factory.created().into_iter().find(|m| m.id == "c").unwrap();
    assert_eq!(condition.configuration["limit"], json!(5));

    let missing = Rule::from_template("nowhere", Default::default()).with_uid("r2");
    engine.register(missing).unwrap();
    assert_eq!(
        engine.status("r2").unwrap().detail,
        RuleStatusDetail::ConfigurationError
    );
}

#[tokio::test]
async fn test_update_rewires_and_disposes_old_handlers() {
    let factory = MockFactory::new("test");
    let engine = engine_with(factory.clone());
    engine.register(level_rule("r1")).unwrap();
    let old_trigger = factory.trigger("r1", "t");

    let updated = Rule::new(
        vec![Module::new("t", "test:Trigger")],
        vec![],
        vec![Module::new("b", "test:Action").with_connection("value", "t", "level")],
    )
    .with_uid("r1");
    engine.update(updated).unwrap();

    assert!(!old_trigger.has_callback());
    let disposed = factory.disposed();
    assert!(disposed.contains(&"a".to_string()));
    assert!(disposed.contains(&"c".to_string()));

    old_trigger.fire(values(&[("level", json!(1))]));
    factory.trigger("r1", "t").fire(values(&[("level", json!(2))]));

    assert!(wait_until(|| factory.call_count("b") == 1).await);
    settle().await;
    assert_eq!(factory.call_count("a"), 0);
    assert_eq!(factory.calls_for("b")[0].inputs, values(&[("value", json!(2))]));
}

#[tokio::test]
async fn test_unregister_disposes_and_silences_triggers() {
    let factory = MockFactory::new("test");
    let engine = engine_with(factory.clone());
    engine.register(level_rule("r1")).unwrap();
    let trigger = factory.trigger("r1", "t");

    let removed = engine.unregister("r1").unwrap();
    assert_eq!(removed.uid.as_deref(), Some("r1"));
    assert!(engine.get("r1").is_none());
    assert_eq!(factory.disposed().len(), 3);

    trigger.fire(values(&[("level", json!(1))]));
    settle().await;
    assert!(factory.calls().is_empty());

    assert!(matches!(engine.unregister("r1"), Err(EngineError::UnknownRule(_))));
    assert!(matches!(engine.status("r1"), Err(EngineError::UnknownRule(_))));
}

#[tokio::test]
async fn test_model_errors_rejected_at_register() {
    let factory = MockFactory::new("test");
    let engine = engine_with(factory);

    let duplicate_ids = Rule::new(
        vec![Module::new("x", "test:Trigger")],
        vec![],
        vec![Module::new("x", "test:Action")],
    )
    .with_uid("r1");
    assert!(matches!(
        engine.register(duplicate_ids),
        Err(EngineError::InvalidRule(_))
    ));

    let trigger_with_input = Rule::new(
        vec![Module::new("t", "test:Trigger").with_connection("x", "a", "y")],
        vec![],
        vec![Module::new("a", "test:Action")],
    )
    .with_uid("r2");
    assert!(matches!(
        engine.register(trigger_with_input),
        Err(EngineError::InvalidRule(_))
    ));

    assert!(matches!(
        engine.register(level_rule("r3").with_uid("")),
        Err(EngineError::MissingUid)
    ));

    engine.register(level_rule("r3")).unwrap();
    assert!(matches!(
        engine.register(level_rule("r3")),
        Err(EngineError::DuplicateRule(_))
    ));
    assert_eq!(engine.rules().len(), 1);
}

#[tokio::test]
async fn test_handler_timeout() {
    let factory = MockFactory::new("test");
    factory.set_delay(Duration::from_millis(200));
    let engine = RuleEngine::builder(
        Arc::new(ModuleTypeRegistry::new()),
        Arc::new(HandlerFactoryRegistry::new()),
    )
    .with_handler_timeout(Some(Duration::from_millis(20)))
    .build();
    engine.add_handler_factory(factory.clone());
    engine.register(level_rule("r1")).unwrap();

    factory.trigger("r1", "t").fire(values(&[("level", json!(1))]));

    assert!(wait_until(|| factory.call_count("c") == 1).await);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(factory.call_count("a"), 0);
    assert_eq!(engine.status("r1").unwrap().status, RuleStatus::Idle);
}

#[tokio::test]
async fn test_dispose_releases_everything() {
    let factory = MockFactory::new("test");
    let engine = engine_with(factory.clone());
    engine.register(level_rule("r1")).unwrap();
    engine.register(level_rule("r2")).unwrap();

    engine.dispose();

    assert!(engine.rules().is_empty());
    assert_eq!(factory.disposed().len(), 6);
}

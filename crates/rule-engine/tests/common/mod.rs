//! Common test utilities for the rule engine
//!
//! Provides a scriptable handler factory and polling helpers.

#![allow(dead_code)]

mod mock_factory;

pub use mock_factory::*;

use rule_core::{ModuleTypeRegistry, SharedModuleTypeCatalog, Values};
use rule_engine::RuleEngine;
use rule_handler_registry::HandlerFactoryRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Poll `condition` until it holds or two seconds pass
pub async fn wait_until(condition: impl Fn() -> bool) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Give spawned workers a chance to run
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/// Engine with an empty type catalog and `factory` registered
pub fn engine_with(factory: Arc<MockFactory>) -> RuleEngine {
    engine_with_catalog(factory, Arc::new(ModuleTypeRegistry::new()))
}

pub fn engine_with_catalog(
    factory: Arc<MockFactory>,
    catalog: SharedModuleTypeCatalog,
) -> RuleEngine {
    let engine = RuleEngine::new(catalog, Arc::new(HandlerFactoryRegistry::new()));
    engine.add_handler_factory(factory);
    engine
}

/// Build a `Values` map from `(name, value)` pairs
pub fn values(pairs: &[(&str, serde_json::Value)]) -> Values {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

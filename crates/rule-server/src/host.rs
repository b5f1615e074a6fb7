//! Wiring of the engine, handlers and storage for the host process

use anyhow::{anyhow, Context as _, Result};
use rule_builtins::{module_types, CoreHandlerFactory};
use rule_config::{EngineConfig, ServerConfig};
use rule_core::{ModuleTypeRegistry, RuleStatus};
use rule_engine::{RuleEngine, RuleManager, SharedRuleEngine};
use rule_event_bus::{EventBus, SharedEventBus};
use rule_handler_registry::HandlerFactoryRegistry;
use rule_resolver::{TypeRegistry, ValueKind};
use rule_storage::{JsonRuleStorage, MemoryRuleStorage, SharedRuleStorage};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

/// A running rule engine with its built-in handlers
pub struct RuleHost {
    pub bus: SharedEventBus,
    pub engine: SharedRuleEngine,
    pub manager: RuleManager,
}

impl RuleHost {
    /// Build the engine, load persisted rules and apply configured ones
    pub async fn start(config: &ServerConfig) -> Result<Self> {
        let bus: SharedEventBus = Arc::new(EventBus::new());

        let catalog = Arc::new(ModuleTypeRegistry::new());
        catalog.extend(module_types());

        let engine = Arc::new(
            RuleEngine::builder(catalog, Arc::new(HandlerFactoryRegistry::new()))
                .with_handler_timeout(config.engine.handler_timeout)
                .with_type_registry(type_registry(&config.engine)?)
                .build(),
        );
        engine.add_handler_factory(Arc::new(CoreHandlerFactory::new(
            bus.clone(),
            Handle::current(),
        )));

        let storage: SharedRuleStorage = match &config.storage.path {
            Some(path) => {
                info!(path = %path.display(), "Using rule file storage");
                Arc::new(JsonRuleStorage::new(path))
            }
            None => {
                info!("Using in-memory rule storage");
                Arc::new(MemoryRuleStorage::new())
            }
        };

        let manager = RuleManager::new(engine.clone(), storage);
        manager
            .load()
            .await
            .context("loading persisted rules")?;

        let host = Self {
            bus,
            engine,
            manager,
        };
        host.apply_configured_rules(config).await;
        host.report();
        Ok(host)
    }

    /// Add configured rules, replacing persisted rules with the same UID
    ///
    /// Configured rules need a UID so restarts do not duplicate them.
    async fn apply_configured_rules(&self, config: &ServerConfig) {
        for rule in &config.rules {
            let Some(uid) = rule.uid.as_deref().filter(|uid| !uid.is_empty()) else {
                warn!(name = %rule.display_name(), "Skipping configured rule without a uid");
                continue;
            };

            let result = if self.manager.get(uid).is_some() {
                self.manager.update(rule).await
            } else {
                self.manager.add(rule, None).await
            };
            if let Err(e) = result {
                warn!(rule_uid = %uid, error = %e, "Configured rule rejected");
            }
        }
    }

    /// Log every rule that could not be initialized
    fn report(&self) {
        let rules = self.manager.get_all();
        let mut active = 0;
        for rule in &rules {
            match self.manager.get_status(rule.uid_str()) {
                Ok(status) if status.status == RuleStatus::NotInitialized => warn!(
                    rule_uid = %rule.uid_str(),
                    detail = ?status.detail,
                    reason = status.description.as_deref().unwrap_or_default(),
                    "Rule not initialized"
                ),
                Ok(status) if status.status != RuleStatus::Disabled => active += 1,
                _ => {}
            }
        }
        info!(rules = rules.len(), active, "Rules ready");
    }

    pub fn shutdown(&self) {
        self.engine.dispose();
    }
}

/// Built-in value type tags plus the configured ones
fn type_registry(config: &EngineConfig) -> Result<TypeRegistry> {
    let mut types = TypeRegistry::new();
    for tag in &config.type_tags {
        let kind: ValueKind = tag
            .kind
            .parse()
            .map_err(|()| anyhow!("type tag '{}' has unknown kind '{}'", tag.name, tag.kind))?;
        types.register(&tag.name, kind, tag.parent.as_deref());
    }
    Ok(types)
}

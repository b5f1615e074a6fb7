//! Rule execution engine
//!
//! The engine owns the table of registered rules, binds their handlers,
//! and runs each rule's trigger events through its own worker. Lifecycle
//! operations are synchronous and serialized by an internal lock; trigger
//! processing happens on tokio tasks spawned on the engine's runtime.

use dashmap::DashMap;
use rule_core::{
    Rule, RuleStatus, RuleStatusDetail, RuleStatusInfo, SharedModuleTypeCatalog,
    SharedTemplateCatalog, Values,
};
use rule_handler_registry::{ModuleHandlerFactory, SharedHandlerRegistry};
use rule_resolver::TypeRegistry;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, instrument, warn};

use crate::binding::{expand_template, BindFailure, Binder};
use crate::callback::EngineCallback;
use crate::error::{EngineError, EngineResult};
use crate::queue::RuleQueue;
use crate::runtime::{InvokeOptions, RuntimeRule};

/// Thread-safe handle to an engine
pub type SharedRuleEngine = Arc<RuleEngine>;

/// A registered rule and its binding state
struct RuleEntry {
    rule: Rule,
    runtime: Option<Arc<RuntimeRule>>,
    failure: Option<BindFailure>,
}

/// State shared between the engine handle, callbacks and workers
pub(crate) struct EngineShared {
    rules: DashMap<String, RuleEntry>,
    pub(crate) queues: DashMap<String, RuleQueue>,
    registry: SharedHandlerRegistry,
    catalog: SharedModuleTypeCatalog,
    templates: Option<SharedTemplateCatalog>,
    pub(crate) types: TypeRegistry,
    pub(crate) invoke_options: InvokeOptions,
    pub(crate) runtime: Handle,
    lifecycle: Mutex<()>,
}

impl EngineShared {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn contains(&self, uid: &str) -> bool {
        self.rules.contains_key(uid)
    }

    /// Bound runtime of an enabled rule
    pub(crate) fn active_runtime(&self, uid: &str) -> Option<Arc<RuntimeRule>> {
        self.rules
            .get(uid)
            .filter(|entry| entry.rule.enabled)
            .and_then(|entry| entry.runtime.clone())
    }

    /// Bind the handlers of a stored, enabled rule
    fn activate(self: &Arc<Self>, uid: &str) {
        let Some(mut rule) = self.rules.get(uid).map(|entry| entry.rule.clone()) else {
            return;
        };
        if !rule.enabled {
            return;
        }

        let result = self.expand(&mut rule).and_then(|()| {
            Binder {
                registry: &self.registry,
                types: self.catalog.as_ref(),
                tags: &self.types,
            }
            .bind(&rule)
        });

        match result {
            Ok(modules) => {
                let callback = EngineCallback::new(uid, Arc::downgrade(self));
                let runtime = Arc::new(RuntimeRule::new(uid, modules, callback));
                if let Some(mut entry) = self.rules.get_mut(uid) {
                    entry.rule = rule;
                    entry.runtime = Some(runtime.clone());
                    entry.failure = None;
                }
                runtime.install_callback();
                info!(rule_uid = %uid, "Rule activated");
            }
            Err(failure) => {
                warn!(
                    rule_uid = %uid,
                    detail = ?failure.detail,
                    reason = %failure.description,
                    "Rule could not be initialized"
                );
                if let Some(mut entry) = self.rules.get_mut(uid) {
                    entry.rule = rule;
                    entry.runtime = None;
                    entry.failure = Some(failure);
                }
            }
        }
    }

    /// Replace a template-based rule with its instantiated form
    fn expand(&self, rule: &mut Rule) -> Result<(), BindFailure> {
        if !rule.needs_template() {
            return Ok(());
        }
        let expanded = expand_template(rule, self.templates.as_deref())?;
        expanded.validate().map_err(|e| BindFailure {
            detail: RuleStatusDetail::ConfigurationError,
            description: format!("template expansion: {}", e),
        })?;
        *rule = expanded;
        Ok(())
    }

    /// Release the handlers of a rule, leaving it registered
    fn deactivate(&self, uid: &str) {
        let runtime = self
            .rules
            .get_mut(uid)
            .and_then(|mut entry| entry.runtime.take());
        if let Some(runtime) = runtime {
            runtime.dispose();
            debug!(rule_uid = %uid, "Rule deactivated");
        }
    }
}

/// Builder for [`RuleEngine`]
pub struct RuleEngineBuilder {
    catalog: SharedModuleTypeCatalog,
    registry: SharedHandlerRegistry,
    templates: Option<SharedTemplateCatalog>,
    types: TypeRegistry,
    handler_timeout: Option<Duration>,
}

impl RuleEngineBuilder {
    pub fn with_templates(mut self, templates: SharedTemplateCatalog) -> Self {
        self.templates = Some(templates);
        self
    }

    /// Replace the built-in value type tags
    pub fn with_type_registry(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    /// Fail a handler call that runs longer than `timeout`
    ///
    /// Off by default: without a deadline a stuck handler stalls its rule.
    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    /// Rule workers are spawned on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn build(self) -> RuleEngine {
        let runtime = Handle::current();

        RuleEngine {
            shared: Arc::new(EngineShared {
                rules: DashMap::new(),
                queues: DashMap::new(),
                registry: self.registry,
                catalog: self.catalog,
                templates: self.templates,
                types: self.types,
                invoke_options: InvokeOptions {
                    timeout: self.handler_timeout,
                },
                runtime,
                lifecycle: Mutex::new(()),
            }),
        }
    }
}

/// The rule execution engine
///
/// Rules passed in and returned are value snapshots; the engine keeps its
/// own copies.
pub struct RuleEngine {
    pub(crate) shared: Arc<EngineShared>,
}

impl RuleEngine {
    /// Create an engine spawning workers on the current tokio runtime
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(catalog: SharedModuleTypeCatalog, registry: SharedHandlerRegistry) -> Self {
        Self::builder(catalog, registry).build()
    }

    pub fn builder(
        catalog: SharedModuleTypeCatalog,
        registry: SharedHandlerRegistry,
    ) -> RuleEngineBuilder {
        RuleEngineBuilder {
            catalog,
            registry,
            templates: None,
            types: TypeRegistry::new(),
            handler_timeout: None,
        }
    }

    /// Register a rule and bind its handlers
    ///
    /// The rule must carry a UID. Binding failures do not fail the call;
    /// they leave the rule `NOT_INITIALIZED` with the reason in its status.
    #[instrument(skip(self, rule), fields(rule_uid = ?rule.uid))]
    pub fn register(&self, rule: Rule) -> EngineResult<Rule> {
        let uid = rule
            .uid
            .clone()
            .filter(|uid| !uid.is_empty())
            .ok_or(EngineError::MissingUid)?;
        rule.validate()?;

        let _guard = self.shared.lock();
        match self.shared.rules.entry(uid.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(EngineError::DuplicateRule(uid));
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(RuleEntry {
                    rule,
                    runtime: None,
                    failure: None,
                });
            }
        }

        debug!(rule_uid = %uid, "Registered rule");
        self.shared.activate(&uid);
        self.get(&uid).ok_or(EngineError::UnknownRule(uid))
    }

    /// Replace a registered rule and re-bind it from scratch
    #[instrument(skip(self, rule), fields(rule_uid = ?rule.uid))]
    pub fn update(&self, rule: Rule) -> EngineResult<Rule> {
        let uid = rule
            .uid
            .clone()
            .filter(|uid| !uid.is_empty())
            .ok_or(EngineError::MissingUid)?;
        rule.validate()?;

        let _guard = self.shared.lock();
        if !self.shared.rules.contains_key(&uid) {
            return Err(EngineError::UnknownRule(uid));
        }

        self.shared.deactivate(&uid);
        if let Some(mut entry) = self.shared.rules.get_mut(&uid) {
            entry.rule = rule;
            entry.failure = None;
        }

        debug!(rule_uid = %uid, "Updated rule");
        self.shared.activate(&uid);
        self.get(&uid).ok_or(EngineError::UnknownRule(uid))
    }

    /// Remove a rule, disposing its handlers and pending events
    #[instrument(skip(self))]
    pub fn unregister(&self, uid: &str) -> EngineResult<Rule> {
        let _guard = self.shared.lock();
        let (_, entry) = self
            .shared
            .rules
            .remove(uid)
            .ok_or_else(|| EngineError::UnknownRule(uid.to_string()))?;

        if let Some(runtime) = entry.runtime {
            runtime.dispose();
        }
        self.shared.drop_queue(uid);

        info!(rule_uid = %uid, "Rule removed");
        Ok(entry.rule)
    }

    /// Enable or disable a rule
    ///
    /// Disabling releases the handlers; events still queued are discarded
    /// without reaching any handler. Enabling binds the rule again.
    #[instrument(skip(self))]
    pub fn set_enabled(&self, uid: &str, enabled: bool) -> EngineResult<()> {
        let _guard = self.shared.lock();
        {
            let mut entry = self
                .shared
                .rules
                .get_mut(uid)
                .ok_or_else(|| EngineError::UnknownRule(uid.to_string()))?;
            if entry.rule.enabled == enabled {
                return Ok(());
            }
            entry.rule.enabled = enabled;
            entry.failure = None;
        }

        if enabled {
            info!(rule_uid = %uid, "Rule enabled");
            self.shared.activate(uid);
        } else {
            info!(rule_uid = %uid, "Rule disabled");
            self.shared.deactivate(uid);
        }
        Ok(())
    }

    pub fn contains(&self, uid: &str) -> bool {
        self.shared.contains(uid)
    }

    /// Snapshot of a registered rule
    pub fn get(&self, uid: &str) -> Option<Rule> {
        self.shared.rules.get(uid).map(|entry| entry.rule.clone())
    }

    /// Snapshots of every registered rule, sorted by UID
    pub fn rules(&self) -> Vec<Rule> {
        let mut rules: Vec<Rule> = self
            .shared
            .rules
            .iter()
            .map(|entry| entry.rule.clone())
            .collect();
        rules.sort_by(|a, b| a.uid.cmp(&b.uid));
        rules
    }

    /// Current status of a rule
    pub fn status(&self, uid: &str) -> EngineResult<RuleStatusInfo> {
        let entry = self
            .shared
            .rules
            .get(uid)
            .ok_or_else(|| EngineError::UnknownRule(uid.to_string()))?;

        if !entry.rule.enabled {
            return Ok(RuleStatusInfo::new(RuleStatus::Disabled));
        }
        if entry.runtime.is_none() {
            return Ok(match &entry.failure {
                Some(failure) => RuleStatusInfo::with_detail(
                    RuleStatus::NotInitialized,
                    failure.detail,
                    failure.description.clone(),
                ),
                None => RuleStatusInfo::new(RuleStatus::NotInitialized),
            });
        }
        drop(entry);

        Ok(if self.shared.is_running(uid) {
            RuleStatusInfo::new(RuleStatus::Running)
        } else {
            RuleStatusInfo::new(RuleStatus::Idle)
        })
    }

    /// Values last published by a trigger or action of a bound rule
    pub fn module_outputs(&self, uid: &str, module_id: &str) -> Option<Values> {
        self.shared
            .rules
            .get(uid)
            .and_then(|entry| entry.runtime.clone())
            .and_then(|runtime| runtime.outputs(module_id))
    }

    /// Register a handler factory and bind the rules that were waiting for it
    ///
    /// Returns the type prefixes the factory was accepted for.
    #[instrument(skip(self, factory))]
    pub fn add_handler_factory(&self, factory: Arc<dyn ModuleHandlerFactory>) -> Vec<String> {
        let _guard = self.shared.lock();
        let accepted = self.shared.registry.add_factory(factory);
        if accepted.is_empty() {
            return accepted;
        }

        let prefixes: HashSet<&str> = accepted.iter().map(String::as_str).collect();
        let waiting: Vec<String> = self
            .shared
            .rules
            .iter()
            .filter(|entry| {
                entry.rule.enabled
                    && entry.runtime.is_none()
                    && entry
                        .failure
                        .as_ref()
                        .is_some_and(|f| f.detail == RuleStatusDetail::HandlerMissingError)
                    && entry
                        .rule
                        .modules()
                        .any(|(_, m)| prefixes.contains(m.type_prefix()))
            })
            .map(|entry| entry.key().clone())
            .collect();

        for uid in waiting {
            debug!(rule_uid = %uid, "Re-binding rule after handler factory arrival");
            self.shared.activate(&uid);
        }
        accepted
    }

    /// Unregister a handler factory
    ///
    /// Rules already bound keep their handlers until they are re-bound.
    #[instrument(skip(self, factory))]
    pub fn remove_handler_factory(&self, factory: &Arc<dyn ModuleHandlerFactory>) -> Vec<String> {
        let _guard = self.shared.lock();
        self.shared.registry.remove_factory(factory)
    }

    /// Unbind and forget every rule
    pub fn dispose(&self) {
        let _guard = self.shared.lock();
        let uids: Vec<String> = self.shared.rules.iter().map(|e| e.key().clone()).collect();
        for uid in &uids {
            self.shared.deactivate(uid);
        }
        self.shared.rules.clear();
        self.shared.queues.clear();
        info!(rules = uids.len(), "Rule engine disposed");
    }
}

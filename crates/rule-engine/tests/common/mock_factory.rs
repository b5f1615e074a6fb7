//! Scriptable handler factory
//!
//! Conditions and actions run closures registered per module id and record
//! every invocation. Triggers are fired by hand through [`MockTrigger::fire`].

use async_trait::async_trait;
use rule_core::{Module, ModuleKind, Values};
use rule_handler_registry::{
    ActionHandler, ConditionHandler, HandlerError, HandlerResult, ModuleHandler,
    ModuleHandlerFactory, SharedCallback, TriggerHandler,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub type ConditionFn = Arc<dyn Fn(&Values) -> HandlerResult<bool> + Send + Sync>;
pub type ActionFn = Arc<dyn Fn(&Values) -> HandlerResult<Option<Values>> + Send + Sync>;

/// One recorded handler invocation
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub rule_uid: String,
    pub module_id: String,
    pub inputs: Values,
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl Shared {
    async fn enter(&self, rule_uid: &str, module_id: &str, inputs: &Values) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.calls.lock().unwrap().push(Call {
            rule_uid: rule_uid.to_string(),
            module_id: module_id.to_string(),
            inputs: inputs.clone(),
        });

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Factory serving every type under one prefix
pub struct MockFactory {
    prefix: String,
    shared: Arc<Shared>,
    conditions: Mutex<HashMap<String, ConditionFn>>,
    actions: Mutex<HashMap<String, ActionFn>>,
    triggers: Mutex<HashMap<String, Arc<MockTrigger>>>,
    failing: Mutex<HashSet<String>>,
    created: Mutex<Vec<Module>>,
    disposed: Mutex<Vec<String>>,
}

impl MockFactory {
    pub fn new(prefix: &str) -> Arc<Self> {
        Arc::new(Self {
            prefix: prefix.to_string(),
            shared: Arc::new(Shared::default()),
            conditions: Mutex::new(HashMap::new()),
            actions: Mutex::new(HashMap::new()),
            triggers: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            created: Mutex::new(Vec::new()),
            disposed: Mutex::new(Vec::new()),
        })
    }

    pub fn on_condition(
        &self,
        module_id: &str,
        f: impl Fn(&Values) -> HandlerResult<bool> + Send + Sync + 'static,
    ) {
        self.conditions
            .lock()
            .unwrap()
            .insert(module_id.to_string(), Arc::new(f));
    }

    pub fn on_action(
        &self,
        module_id: &str,
        f: impl Fn(&Values) -> HandlerResult<Option<Values>> + Send + Sync + 'static,
    ) {
        self.actions
            .lock()
            .unwrap()
            .insert(module_id.to_string(), Arc::new(f));
    }

    /// Make `create_handler` fail for this module id
    pub fn fail_creation(&self, module_id: &str) {
        self.failing.lock().unwrap().insert(module_id.to_string());
    }

    /// Delay every condition and action call
    pub fn set_delay(&self, delay: Duration) {
        *self.shared.delay.lock().unwrap() = Some(delay);
    }

    /// Block every condition and action call until a permit is released
    pub fn set_gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.shared.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Most recent trigger handler created for `module_id` of `rule_uid`
    pub fn trigger(&self, rule_uid: &str, module_id: &str) -> Arc<MockTrigger> {
        self.triggers
            .lock()
            .unwrap()
            .get(&format!("{}/{}", rule_uid, module_id))
            .cloned()
            .unwrap_or_else(|| panic!("no trigger handler for {}/{}", rule_uid, module_id))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, module_id: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.module_id == module_id)
            .collect()
    }

    pub fn call_count(&self, module_id: &str) -> usize {
        self.calls_for(module_id).len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.shared.max_in_flight.load(Ordering::SeqCst)
    }

    /// Modules handed to `create_handler`, with resolved configuration
    pub fn created(&self) -> Vec<Module> {
        self.created.lock().unwrap().clone()
    }

    pub fn disposed(&self) -> Vec<String> {
        self.disposed.lock().unwrap().clone()
    }
}

impl ModuleHandlerFactory for MockFactory {
    fn types(&self) -> Vec<String> {
        vec![self.prefix.clone()]
    }

    fn create_handler(
        &self,
        module: &Module,
        kind: ModuleKind,
        rule_uid: &str,
    ) -> HandlerResult<ModuleHandler> {
        if self.failing.lock().unwrap().contains(&module.id) {
            return Err(HandlerError::Initialization(format!("{} refused", module.id)));
        }
        self.created.lock().unwrap().push(module.clone());

        let handler = match kind {
            ModuleKind::Trigger => {
                let trigger = Arc::new(MockTrigger {
                    module: module.clone(),
                    callback: Mutex::new(None),
                });
                self.triggers
                    .lock()
                    .unwrap()
                    .insert(format!("{}/{}", rule_uid, module.id), trigger.clone());
                ModuleHandler::Trigger(trigger)
            }
            ModuleKind::Condition => {
                let verdict: ConditionFn = match self.conditions.lock().unwrap().get(&module.id) {
                    Some(f) => f.clone(),
                    None => Arc::new(always_satisfied),
                };
                ModuleHandler::Condition(Arc::new(MockCondition {
                    rule_uid: rule_uid.to_string(),
                    module_id: module.id.clone(),
                    shared: self.shared.clone(),
                    verdict,
                }))
            }
            ModuleKind::Action => {
                let run: ActionFn = match self.actions.lock().unwrap().get(&module.id) {
                    Some(f) => f.clone(),
                    None => Arc::new(no_outputs),
                };
                ModuleHandler::Action(Arc::new(MockAction {
                    rule_uid: rule_uid.to_string(),
                    module_id: module.id.clone(),
                    shared: self.shared.clone(),
                    run,
                }))
            }
        };
        Ok(handler)
    }

    fn dispose_handler(&self, module: &Module, handler: ModuleHandler) {
        self.disposed.lock().unwrap().push(module.id.clone());
        handler.dispose();
    }
}

fn always_satisfied(_: &Values) -> HandlerResult<bool> {
    Ok(true)
}

fn no_outputs(_: &Values) -> HandlerResult<Option<Values>> {
    Ok(None)
}

/// Trigger fired by the test body
pub struct MockTrigger {
    module: Module,
    callback: Mutex<Option<SharedCallback>>,
}

impl MockTrigger {
    pub fn fire(&self, outputs: Values) {
        let callback = self.callback.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback.triggered(&self.module, outputs);
        }
    }

    pub fn has_callback(&self) -> bool {
        self.callback.lock().unwrap().is_some()
    }
}

impl TriggerHandler for MockTrigger {
    fn set_callback(&self, callback: Option<SharedCallback>) {
        *self.callback.lock().unwrap() = callback;
    }
}

struct MockCondition {
    rule_uid: String,
    module_id: String,
    shared: Arc<Shared>,
    verdict: ConditionFn,
}

#[async_trait]
impl ConditionHandler for MockCondition {
    async fn is_satisfied(&self, inputs: &Values) -> HandlerResult<bool> {
        self.shared.enter(&self.rule_uid, &self.module_id, inputs).await;
        let result = (self.verdict)(inputs);
        self.shared.leave();
        result
    }
}

struct MockAction {
    rule_uid: String,
    module_id: String,
    shared: Arc<Shared>,
    run: ActionFn,
}

#[async_trait]
impl ActionHandler for MockAction {
    async fn execute(&self, inputs: &Values) -> HandlerResult<Option<Values>> {
        self.shared.enter(&self.rule_uid, &self.module_id, inputs).await;
        let result = (self.run)(inputs);
        self.shared.leave();
        result
    }
}

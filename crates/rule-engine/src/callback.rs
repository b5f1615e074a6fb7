//! Trigger callback installed into a rule's trigger handlers

use rule_core::{Module, Values};
use rule_handler_registry::RuleEngineCallback;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;
use tracing::{debug, trace};

use crate::engine::EngineShared;
use crate::queue::TriggerData;

/// Routes trigger events of one rule into that rule's queue
///
/// Holds only a weak reference to the engine, so a handler that outlives
/// the engine keeps nothing alive. Once disposed, every event is dropped.
pub(crate) struct EngineCallback {
    rule_uid: String,
    engine: Weak<EngineShared>,
    disposed: AtomicBool,
}

impl EngineCallback {
    pub(crate) fn new(rule_uid: impl Into<String>, engine: Weak<EngineShared>) -> Self {
        Self {
            rule_uid: rule_uid.into(),
            engine,
            disposed: AtomicBool::new(false),
        }
    }

    pub(crate) fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl RuleEngineCallback for EngineCallback {
    fn triggered(&self, trigger: &Module, outputs: Values) {
        if self.is_disposed() {
            debug!(
                rule_uid = %self.rule_uid,
                trigger = %trigger.id,
                "Dropping event from stale callback"
            );
            return;
        }

        let Some(engine) = self.engine.upgrade() else {
            debug!(rule_uid = %self.rule_uid, "Engine gone, dropping trigger event");
            return;
        };

        trace!(rule_uid = %self.rule_uid, trigger = %trigger.id, "Trigger fired");
        engine.enqueue(
            &self.rule_uid,
            TriggerData {
                trigger_id: trigger.id.clone(),
                outputs,
            },
        );
    }
}

//! Per-rule trigger queues and their workers
//!
//! Each rule owns a FIFO of [`TriggerData`]. The first event arriving at an
//! idle rule spawns a worker task that drains the queue and exits when it
//! finds it empty. The pop and the worker hand-off happen under the same
//! map entry lock, so at most one worker per rule exists at any time.

use rule_core::Values;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::engine::EngineShared;
use crate::runtime::Outcome;

/// One queued firing of a trigger
#[derive(Debug, Clone)]
pub(crate) struct TriggerData {
    pub trigger_id: String,
    /// Raw outputs as reported by the trigger handler
    pub outputs: Values,
}

#[derive(Debug, Default)]
pub(crate) struct RuleQueue {
    pending: VecDeque<TriggerData>,
    worker_active: bool,
}

impl EngineShared {
    /// Append an event to the rule's queue, starting a worker when idle
    pub(crate) fn enqueue(self: &Arc<Self>, rule_uid: &str, data: TriggerData) {
        let start_worker = {
            let mut queue = self.queues.entry(rule_uid.to_string()).or_default();
            queue.pending.push_back(data);
            trace!(rule_uid = %rule_uid, queued = queue.pending.len(), "Queued trigger data");
            !std::mem::replace(&mut queue.worker_active, true)
        };

        if start_worker {
            let engine = self.clone();
            let rule_uid = rule_uid.to_string();
            self.runtime.spawn(async move {
                engine.run_worker(rule_uid).await;
            });
        }
    }

    /// Whether a worker is currently draining the rule's queue
    pub(crate) fn is_running(&self, rule_uid: &str) -> bool {
        self.queues
            .get(rule_uid)
            .map(|queue| queue.worker_active)
            .unwrap_or(false)
    }

    /// Forget pending events of a rule that is going away
    pub(crate) fn drop_queue(&self, rule_uid: &str) {
        if self
            .queues
            .remove_if(rule_uid, |_, queue| !queue.worker_active)
            .is_none()
        {
            if let Some(mut queue) = self.queues.get_mut(rule_uid) {
                let dropped = queue.pending.len();
                queue.pending.clear();
                if dropped > 0 {
                    debug!(rule_uid = %rule_uid, dropped, "Dropped queued trigger data");
                }
            }
        }
    }

    /// Take the next event, or retire the worker when the queue is empty
    ///
    /// A retiring worker of a rule that was removed meanwhile also drops
    /// the rule's queue.
    fn next_event(&self, rule_uid: &str) -> Option<TriggerData> {
        {
            let mut queue = self.queues.get_mut(rule_uid)?;
            if let Some(next) = queue.pending.pop_front() {
                return Some(next);
            }
            queue.worker_active = false;
        }

        if !self.contains(rule_uid) {
            self.queues.remove_if(rule_uid, |_, queue| {
                !queue.worker_active && queue.pending.is_empty()
            });
        }
        None
    }

    async fn run_worker(self: Arc<Self>, rule_uid: String) {
        debug!(rule_uid = %rule_uid, "Rule worker started");

        while let Some(data) = self.next_event(&rule_uid) {
            let Some(runtime) = self.active_runtime(&rule_uid) else {
                debug!(
                    rule_uid = %rule_uid,
                    trigger = %data.trigger_id,
                    "Rule disabled or unbound, discarding trigger data"
                );
                continue;
            };

            let trigger_id = data.trigger_id.clone();
            match runtime.process(data, &self.types, self.invoke_options).await {
                Ok(Outcome::Executed) => {
                    debug!(rule_uid = %rule_uid, trigger = %trigger_id, "Rule actions executed");
                }
                Ok(Outcome::Rejected) => {
                    debug!(rule_uid = %rule_uid, trigger = %trigger_id, "Conditions not satisfied");
                }
                Ok(Outcome::Stale) => {
                    debug!(
                        rule_uid = %rule_uid,
                        trigger = %trigger_id,
                        "Trigger no longer part of rule"
                    );
                }
                Err(e) => {
                    warn!(
                        rule_uid = %rule_uid,
                        trigger = %trigger_id,
                        error = %e,
                        "Trigger processing aborted"
                    );
                }
            }
        }

        debug!(rule_uid = %rule_uid, "Rule worker finished");
    }
}

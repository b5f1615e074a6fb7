//! A bound rule and its Trigger → Condition → Action processing

use futures::FutureExt;
use rule_core::Values;
use rule_handler_registry::{HandlerError, HandlerResult, ModuleHandler, SharedCallback};
use rule_resolver::{resolve_outputs, TypeRegistry};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::binding::{dispose_modules, BoundModule, BoundModules};
use crate::callback::EngineCallback;
use crate::queue::TriggerData;
use crate::store::OutputStore;

/// What happened to one queued trigger event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    /// Conditions held and every action ran
    Executed,
    /// A condition was not satisfied
    Rejected,
    /// The trigger is no longer part of the rule
    Stale,
}

/// Per-invocation limits applied to handler calls
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct InvokeOptions {
    pub timeout: Option<Duration>,
}

/// A rule whose handlers are bound
pub(crate) struct RuntimeRule {
    pub uid: String,
    modules: BoundModules,
    outputs: OutputStore,
    callback: Arc<EngineCallback>,
}

impl RuntimeRule {
    pub(crate) fn new(
        uid: impl Into<String>,
        modules: BoundModules,
        callback: EngineCallback,
    ) -> Self {
        Self {
            uid: uid.into(),
            modules,
            outputs: OutputStore::new(),
            callback: Arc::new(callback),
        }
    }

    /// Hand the rule callback to every trigger handler
    pub(crate) fn install_callback(&self) {
        let callback: SharedCallback = self.callback.clone();
        for bound in &self.modules.triggers {
            if let ModuleHandler::Trigger(handler) = &bound.handler {
                handler.set_callback(Some(callback.clone()));
            }
        }
    }

    /// Detach the callback and release every handler
    pub(crate) fn dispose(&self) {
        self.callback.dispose();
        for bound in &self.modules.triggers {
            if let ModuleHandler::Trigger(handler) = &bound.handler {
                handler.set_callback(None);
            }
        }
        dispose_modules(&self.modules);
        debug!(rule_uid = %self.uid, "Disposed rule handlers");
    }

    pub(crate) fn outputs(&self, module_id: &str) -> Option<Values> {
        self.outputs.snapshot(module_id)
    }

    /// Run one trigger event through the rule
    pub(crate) async fn process(
        &self,
        data: TriggerData,
        types: &TypeRegistry,
        options: InvokeOptions,
    ) -> HandlerResult<Outcome> {
        let Some(trigger) = self
            .modules
            .triggers
            .iter()
            .find(|t| t.module.id == data.trigger_id)
        else {
            return Ok(Outcome::Stale);
        };

        let resolved = resolve_outputs(data.outputs, &trigger.descriptors.outputs, types);
        for error in &resolved.errors {
            warn!(
                rule_uid = %self.uid,
                module = %trigger.module.id,
                error = %error,
                "Trigger output unresolved"
            );
        }
        self.outputs.publish(&trigger.module.id, resolved.values);

        for condition in &self.modules.conditions {
            if !self.evaluate(condition, options).await? {
                trace!(
                    rule_uid = %self.uid,
                    condition = %condition.module.id,
                    "Condition not satisfied"
                );
                return Ok(Outcome::Rejected);
            }
        }

        for action in &self.modules.actions {
            let produced = self.execute(action, options).await?;
            if let Some(produced) = produced {
                let resolved = resolve_outputs(produced, &action.descriptors.outputs, types);
                for error in &resolved.errors {
                    warn!(
                        rule_uid = %self.uid,
                        module = %action.module.id,
                        error = %error,
                        "Action output unresolved"
                    );
                }
                self.outputs.publish(&action.module.id, resolved.values);
            }
        }

        Ok(Outcome::Executed)
    }

    async fn evaluate(
        &self,
        condition: &BoundModule,
        options: InvokeOptions,
    ) -> HandlerResult<bool> {
        let ModuleHandler::Condition(handler) = &condition.handler else {
            return Err(HandlerError::Execution(format!(
                "'{}' is not bound to a condition handler",
                condition.module.id
            )));
        };
        let inputs = condition.inputs(&self.outputs);
        trace!(
            rule_uid = %self.uid,
            condition = %condition.module.id,
            ?inputs,
            "Evaluating condition"
        );

        invoke(handler.is_satisfied(&inputs), options)
            .await
            .map_err(|e| with_module(e, &condition.module.id))
    }

    async fn execute(
        &self,
        action: &BoundModule,
        options: InvokeOptions,
    ) -> HandlerResult<Option<Values>> {
        let ModuleHandler::Action(handler) = &action.handler else {
            return Err(HandlerError::Execution(format!(
                "'{}' is not bound to an action handler",
                action.module.id
            )));
        };
        let inputs = action.inputs(&self.outputs);
        trace!(rule_uid = %self.uid, action = %action.module.id, ?inputs, "Executing action");

        invoke(handler.execute(&inputs), options)
            .await
            .map_err(|e| with_module(e, &action.module.id))
    }
}

/// Await a handler call, turning panics and overruns into errors
async fn invoke<T, F>(call: F, options: InvokeOptions) -> HandlerResult<T>
where
    F: Future<Output = HandlerResult<T>>,
{
    let guarded = AssertUnwindSafe(call).catch_unwind();

    let outcome = match options.timeout {
        Some(limit) => tokio::time::timeout(limit, guarded)
            .await
            .map_err(|_| HandlerError::Timeout(limit))?,
        None => guarded.await,
    };

    outcome.unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn with_module(error: HandlerError, module_id: &str) -> HandlerError {
    match error {
        HandlerError::Execution(message) => {
            HandlerError::Execution(format!("{}: {}", module_id, message))
        }
        HandlerError::Panicked(message) => {
            HandlerError::Panicked(format!("{}: {}", module_id, message))
        }
        other => other,
    }
}

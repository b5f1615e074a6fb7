//! Trigger firing on event bus events

use rule_core::{Module, Values};
use rule_event_bus::{Event, SharedEventBus};
use rule_handler_registry::{SharedCallback, TriggerHandler};
use serde_json::{json, Value};
use std::sync::Mutex;
use tokio::runtime::Handle;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// Fires its rule for every bus event of one type
///
/// The bus subscription lives only while a callback is installed.
pub struct EventTrigger {
    module: Module,
    event_type: String,
    /// Subset of the payload an event must carry to fire
    event_data: Option<Value>,
    bus: SharedEventBus,
    runtime: Handle,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl EventTrigger {
    pub fn new(module: &Module, event_type: String, bus: SharedEventBus, runtime: Handle) -> Self {
        Self {
            event_data: module.configuration.get("eventData").cloned(),
            module: module.clone(),
            event_type,
            bus,
            runtime,
            listener: Mutex::new(None),
        }
    }

    fn stop(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(listener) = listener {
            listener.abort();
            debug!(module = %self.module.id, event_type = %self.event_type, "Stopped listening");
        }
    }
}

impl Drop for EventTrigger {
    fn drop(&mut self) {
        self.stop();
    }
}

impl TriggerHandler for EventTrigger {
    fn set_callback(&self, callback: Option<SharedCallback>) {
        self.stop();
        let Some(callback) = callback else {
            return;
        };

        // Subscribe before returning so no event fired afterwards is missed
        let mut rx = self.bus.subscribe(&self.event_type);
        let module = self.module.clone();
        let event_data = self.event_data.clone();

        let task = self.runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if !payload_matches(event_data.as_ref(), &event) {
                            trace!(module = %module.id, "Event payload does not match");
                            continue;
                        }
                        let outputs: Values = [
                            ("event_type".to_string(), json!(event.event_type)),
                            ("payload".to_string(), event.payload),
                        ]
                        .into_iter()
                        .collect();
                        callback.triggered(&module, outputs);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        warn!(module = %module.id, missed, "Event trigger lagged behind the bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        *self.listener.lock().unwrap_or_else(|e| e.into_inner()) = Some(task);
        debug!(module = %self.module.id, event_type = %self.event_type, "Listening for events");
    }

    fn dispose(&self) {
        self.stop();
    }
}

fn payload_matches(expected: Option<&Value>, event: &Event) -> bool {
    expected.map_or(true, |expected| json_matches(&event.payload, expected))
}

/// Whether `actual` contains everything in `expected`
///
/// Objects match on the expected keys only; arrays must match element-wise.
pub(crate) fn json_matches(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual_obj), Value::Object(expected_obj)) => {
            expected_obj.iter().all(|(key, expected_val)| {
                actual_obj
                    .get(key)
                    .is_some_and(|actual_val| json_matches(actual_val, expected_val))
            })
        }
        (Value::Array(actual_arr), Value::Array(expected_arr)) => {
            actual_arr.len() == expected_arr.len()
                && actual_arr
                    .iter()
                    .zip(expected_arr)
                    .all(|(a, e)| json_matches(a, e))
        }
        _ => actual == expected,
    }
}

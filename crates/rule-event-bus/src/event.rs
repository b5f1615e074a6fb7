//! Events carried on the bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Subscribing to this event type receives every event
pub const MATCH_ALL: &str = "*";

/// An event fired on the bus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier (ULID)
    pub id: String,

    pub event_type: String,

    #[serde(default)]
    pub payload: serde_json::Value,

    /// Rule that published the event, when fired by a rule action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub time_fired: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with a fresh id and the current time
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Ulid::new().to_string(),
            event_type: event_type.into(),
            payload,
            source: None,
            time_fired: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

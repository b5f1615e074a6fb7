//! Event bus for rule triggers and actions
//!
//! Event sources publish on the bus and the built-in event trigger
//! subscribes to it; rule actions can publish back. Subscribers receive
//! events of one type, or every event when subscribing to [`MATCH_ALL`].

mod event;

pub use event::{Event, MATCH_ALL};

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus
pub struct EventBus {
    /// Broadcast sender per event type
    listeners: DashMap<String, broadcast::Sender<Event>>,
    /// Sender for subscribers to every event
    match_all_sender: broadcast::Sender<Event>,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus whose per-type channels buffer `capacity` events
    ///
    /// A subscriber lagging further behind loses the oldest events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            capacity,
        }
    }

    /// Subscribe to events of one type; [`MATCH_ALL`] subscribes to every event
    pub fn subscribe(&self, event_type: &str) -> broadcast::Receiver<Event> {
        trace!(%event_type, "Subscribing to event type");

        if event_type == MATCH_ALL {
            return self.match_all_sender.subscribe();
        }

        self.listeners
            .entry(event_type.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Deliver an event to the subscribers of its type and to match-all subscribers
    ///
    /// Returns the number of receivers the event reached. The channel of a
    /// type whose receivers are all gone is dropped.
    pub fn fire(&self, event: Event) -> usize {
        debug!(event_type = %event.event_type, id = %event.id, "Firing event");

        // A send error only means there are no live receivers
        let sent = self
            .listeners
            .get(&event.event_type)
            .map(|sender| sender.send(event.clone()));
        if let Some(Err(_)) = sent {
            self.listeners
                .remove_if(&event.event_type, |_, sender| sender.receiver_count() == 0);
            trace!(event_type = %event.event_type, "Dropped channel without receivers");
        }

        let delivered = sent.and_then(Result::ok).unwrap_or(0);
        delivered + self.match_all_sender.send(event).unwrap_or(0)
    }

    /// Number of event types with a channel
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("motion");

        assert_eq!(bus.fire(Event::new("motion", json!({"room": "hall"}))), 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, "motion");
        assert_eq!(received.payload["room"], "hall");
    }

    #[tokio::test]
    async fn test_match_all_subscription() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(MATCH_ALL);

        bus.fire(Event::new("event_a", json!({})));
        bus.fire(Event::new("event_b", json!({})));

        assert_eq!(rx.recv().await.unwrap().event_type, "event_a");
        assert_eq!(rx.recv().await.unwrap().event_type, "event_b");
    }

    #[tokio::test]
    async fn test_no_cross_event_pollution() {
        let bus = EventBus::new();
        let mut rx_a = bus.subscribe("event_a");
        let mut rx_b = bus.subscribe("event_b");

        bus.fire(Event::new("event_a", json!({"type": "a"})));

        assert_eq!(rx_a.recv().await.unwrap().payload["type"], "a");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_fire_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.fire(Event::new("nobody", json!(null))), 0);
    }

    #[test]
    fn test_fire_drops_dead_channels() {
        let bus = EventBus::new();
        let rx = bus.subscribe("motion");
        let _kept = bus.subscribe("door");
        assert_eq!(bus.listener_count(), 2);

        drop(rx);
        assert_eq!(bus.fire(Event::new("motion", json!(1))), 0);
        assert_eq!(bus.listener_count(), 1);

        let mut rx = bus.subscribe("motion");
        assert_eq!(bus.fire(Event::new("motion", json!(2))), 1);
        assert_eq!(rx.try_recv().unwrap().payload, json!(2));
    }
}

//! Event bus abstraction for decoupled event emission.
//!
//! The safety core never talks to a concrete UI event system. It emits
//! onto this trait, which the shell backs with whatever delivery
//! mechanism it has (webview bridge, channel, etc.). `MemoryBus` backs
//! unit tests; `NullBus` backs headless use.

use std::sync::{Arc, Mutex};

/// Trait for emitting events to the UI shell.
pub trait EventBus: Send + Sync {
    /// Emit an event with a JSON payload.
    ///
    /// # Arguments
    /// * `topic` - Event name/topic (e.g. "safety:state_changed")
    /// * `payload` - JSON payload to emit
    fn emit(&self, topic: &str, payload: serde_json::Value);
}

/// Type alias for shared event bus reference.
pub type EventBusRef = Arc<dyn EventBus>;

/// A captured event from [`MemoryBus`].
#[derive(Debug, Clone)]
pub struct EmittedEvent {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// In-memory event bus that captures all emitted events for later
/// inspection. Test-oriented, but exported for shells that want to
/// drain events themselves.
#[derive(Default)]
pub struct MemoryBus {
    events: Mutex<Vec<EmittedEvent>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All captured events, in emission order.
    pub fn events(&self) -> Vec<EmittedEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Captured events matching a topic, in emission order.
    pub fn events_for(&self, topic: &str) -> Vec<EmittedEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.topic == topic)
            .cloned()
            .collect()
    }

    /// The most recent event for a topic, if any.
    pub fn last_for(&self, topic: &str) -> Option<EmittedEvent> {
        self.events_for(topic).pop()
    }

    /// Drop all captured events.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

impl EventBus for MemoryBus {
    fn emit(&self, topic: &str, payload: serde_json::Value) {
        self.events.lock().unwrap().push(EmittedEvent {
            topic: topic.to_string(),
            payload,
        });
    }
}

/// No-op event bus that discards all events.
pub struct NullBus;

impl EventBus for NullBus {
    fn emit(&self, _topic: &str, _payload: serde_json::Value) {
        // Intentionally empty
    }
}

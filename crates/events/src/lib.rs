//! Shared contracts for the safety core.
//!
//! This crate defines the formal contracts (DTOs) that flow between the
//! detectors, the state machine, the capture pipeline and the UI shell.
//! Using shared types prevents runtime deserialization errors from
//! mismatched field names.
//!
//! Also provides the `EventBus` trait for decoupled event emission.

mod bus;

pub use bus::{EmittedEvent, EventBus, EventBusRef, MemoryBus, NullBus};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel location value written when acquisition failed, was denied,
/// or timed out.
pub const LOCATION_UNAVAILABLE: &str = "unavailable";

/// Sentinel location value written when location sharing is switched off.
pub const LOCATION_NOT_ENABLED: &str = "not enabled";

/// The input channel a trigger came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Keyboard chord (e.g. Shift+Alt+S).
    Shortcut,
    /// Rapid repeated clicks on a watched element.
    ClickBurst,
    /// Safe word found in tracked text.
    Keyword,
    /// Device shake above the G-force threshold.
    Motion,
}

/// The abstract "fire" signal a detector emits.
///
/// Created transiently by a detector and consumed immediately by the
/// state machine; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    /// Wall clock of the underlying host event, in milliseconds.
    pub ts_ms: i64,
}

impl TriggerEvent {
    pub fn new(kind: TriggerKind, ts_ms: i64) -> Self {
        Self { kind, ts_ms }
    }

    /// Convenience constructor stamping the current wall clock.
    pub fn now(kind: TriggerKind) -> Self {
        Self::new(kind, Utc::now().timestamp_millis())
    }
}

/// The safety state exposed to UI consumers.
///
/// `Idle` is initial. `Triggered` is momentary: it exists so the "first
/// accepted event wins" instant is visible to observers, and is always
/// followed by `SecureMode` within the same call. `SecureMode` holds
/// until an explicit, authenticated reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyState {
    Idle,
    Triggered,
    SecureMode,
}

/// Event emitted when the safety state changes.
///
/// Producers: state machine
/// Consumers: UI shell (lock screen, secure-mode visuals)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChangedEvent {
    /// State after the transition.
    pub state: SafetyState,
    /// Channel that caused the transition, if any (`None` for reset).
    #[serde(default)]
    pub trigger: Option<TriggerKind>,
    /// Timestamp in milliseconds since epoch.
    pub timestamp_ms: i64,
}

/// Cheap device context read at capture time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
}

/// The immutable audit entry produced once per trigger cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmergencyRecord {
    pub id: Uuid,
    pub recorded_at: DateTime<Utc>,
    /// "lat,long" at full platform precision, or one of the sentinel
    /// values [`LOCATION_UNAVAILABLE`] / [`LOCATION_NOT_ENABLED`].
    pub location: String,
    pub device: DeviceSnapshot,
}

impl EmergencyRecord {
    pub fn new(location: impl Into<String>, device: DeviceSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            location: location.into(),
            device,
        }
    }
}

/// Repository trait for the append-only emergency log.
/// Implemented by the storage layer, allowing the capture pipeline to
/// remain decoupled.
///
/// Deliberately exposes no update or delete: records are immutable once
/// appended.
pub trait EmergencyLogRepository: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn append(&self, user_id: &str, record: &EmergencyRecord) -> Result<(), Self::Error>;
    fn list_for_user(&self, user_id: &str) -> Result<Vec<EmergencyRecord>, Self::Error>;
}

/// In-memory emergency log for tests and headless use.
///
/// Entries are grouped per user and kept in append order, mirroring
/// the persisted log's contract.
#[derive(Default)]
pub struct MemoryLog {
    entries: std::sync::Mutex<Vec<(String, EmergencyRecord)>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of appended records across all users.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl EmergencyLogRepository for MemoryLog {
    type Error = std::convert::Infallible;

    fn append(&self, user_id: &str, record: &EmergencyRecord) -> Result<(), Self::Error> {
        self.entries
            .lock()
            .unwrap()
            .push((user_id.to_string(), record.clone()));
        Ok(())
    }

    fn list_for_user(&self, user_id: &str) -> Result<Vec<EmergencyRecord>, Self::Error> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(uid, _)| uid == user_id)
            .map(|(_, r)| r.clone())
            .collect())
    }
}

/// Event names as constants to prevent typos.
pub mod event_names {
    /// Safety state changed (payload: [`super::StateChangedEvent`]).
    pub const SAFETY_STATE_CHANGED: &str = "safety:state_changed";
    /// Emergency record appended (payload: [`super::EmergencyRecord`]).
    pub const EMERGENCY_RECORDED: &str = "safety:record_appended";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_changed_deserialize() {
        let json = r#"{"state": "secure_mode", "trigger": "shortcut", "timestamp_ms": 12345}"#;
        let event: StateChangedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.state, SafetyState::SecureMode);
        assert_eq!(event.trigger, Some(TriggerKind::Shortcut));
        assert_eq!(event.timestamp_ms, 12345);
    }

    #[test]
    fn test_state_changed_deserialize_minimal() {
        let json = r#"{"state": "idle", "timestamp_ms": 1}"#;
        let event: StateChangedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.state, SafetyState::Idle);
        assert_eq!(event.trigger, None);
    }

    #[test]
    fn test_memory_log_is_per_user_and_ordered() {
        let log = MemoryLog::new();
        let first = EmergencyRecord::new("1.0,2.0", DeviceSnapshot::default());
        let second = EmergencyRecord::new(LOCATION_UNAVAILABLE, DeviceSnapshot::default());
        log.append("alice", &first).unwrap();
        log.append("bob", &second).unwrap();
        log.append("alice", &second).unwrap();

        let alice = log.list_for_user("alice").unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].id, first.id);
        assert_eq!(alice[1].id, second.id);
        assert_eq!(log.list_for_user("bob").unwrap().len(), 1);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_record_roundtrip_preserves_sentinel() {
        let record = EmergencyRecord::new(LOCATION_UNAVAILABLE, DeviceSnapshot::default());
        let json = serde_json::to_string(&record).unwrap();
        let back: EmergencyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.location, LOCATION_UNAVAILABLE);
    }
}

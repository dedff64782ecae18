//! The safety state machine.
//!
//! Owns the {Idle, Triggered, SecureMode} state and the re-entrancy
//! guard: at most one trigger cycle is in flight, regardless of which
//! detector fired or how many fire while SecureMode holds.

use chrono::Utc;
use echoexit_events::{
    event_names, EventBusRef, SafetyState, StateChangedEvent, TriggerEvent,
};
use std::sync::{Arc, Mutex};

/// What the machine did with a trigger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    /// First event of a cycle: the machine is now in SecureMode.
    Accepted,
    /// State was not Idle; the event had no effect.
    Ignored,
}

/// Callback type for state-change observers.
pub type StateObserver = Arc<dyn Fn(StateChangedEvent) + Send + Sync + 'static>;

/// Finite-state machine with an exhaustive transition table.
///
/// Legal transitions:
/// - Idle → Triggered → SecureMode (both inside one
///   [`SafetyStateMachine::on_trigger_event`] call)
/// - SecureMode → Idle (explicit [`SafetyStateMachine::reset`] only)
///
/// Everything else is rejected. Observers and the event bus see every
/// transition, in order, before the mutating call returns.
pub struct SafetyStateMachine {
    state: Mutex<SafetyState>,
    observers: Mutex<Vec<StateObserver>>,
    bus: EventBusRef,
}

impl SafetyStateMachine {
    pub fn new(bus: EventBusRef) -> Self {
        Self {
            state: Mutex::new(SafetyState::Idle),
            observers: Mutex::new(Vec::new()),
            bus,
        }
    }

    pub fn state(&self) -> SafetyState {
        *self.state.lock().expect("state mutex poisoned")
    }

    /// Register an observer for every state change. Observers run
    /// synchronously on the transitioning thread.
    pub fn subscribe(&self, observer: StateObserver) {
        self.observers
            .lock()
            .expect("observer mutex poisoned")
            .push(observer);
    }

    /// Feed one trigger event.
    ///
    /// Ignored unless the state is Idle. On acceptance the machine
    /// passes through Triggered and lands in SecureMode before
    /// returning, so callers observe the full cycle atomically.
    pub fn on_trigger_event(&self, event: TriggerEvent) -> TriggerDecision {
        {
            let mut state = self.state.lock().expect("state mutex poisoned");
            match *state {
                SafetyState::Idle => {
                    *state = SafetyState::Triggered;
                }
                SafetyState::Triggered | SafetyState::SecureMode => {
                    tracing::debug!(kind = ?event.kind, "trigger ignored, cycle already active");
                    return TriggerDecision::Ignored;
                }
            }
        }
        tracing::warn!(kind = ?event.kind, "emergency trigger accepted");
        self.notify(SafetyState::Triggered, Some(event));

        {
            let mut state = self.state.lock().expect("state mutex poisoned");
            // Only this call path leaves Triggered, so the state cannot
            // have moved while observers ran.
            debug_assert_eq!(*state, SafetyState::Triggered);
            *state = SafetyState::SecureMode;
        }
        self.notify(SafetyState::SecureMode, Some(event));

        TriggerDecision::Accepted
    }

    /// Leave SecureMode. Valid only from SecureMode; anywhere else it
    /// is a no-op returning false.
    ///
    /// Precondition (documented, not enforced here): the caller MUST
    /// have authenticated the user (PIN/password check in the shell)
    /// before calling this.
    pub fn reset(&self) -> bool {
        {
            let mut state = self.state.lock().expect("state mutex poisoned");
            match *state {
                SafetyState::SecureMode => {
                    *state = SafetyState::Idle;
                }
                SafetyState::Idle | SafetyState::Triggered => return false,
            }
        }
        tracing::info!("secure mode cleared");
        self.notify(SafetyState::Idle, None);
        true
    }

    /// Deliver a transition to observers and the bus. Runs outside the
    /// state lock so an observer may re-enter (and be Ignored).
    fn notify(&self, state: SafetyState, trigger: Option<TriggerEvent>) {
        let change = StateChangedEvent {
            state,
            trigger: trigger.map(|e| e.kind),
            timestamp_ms: trigger
                .map(|e| e.ts_ms)
                .unwrap_or_else(|| Utc::now().timestamp_millis()),
        };

        let observers = self
            .observers
            .lock()
            .expect("observer mutex poisoned")
            .clone();
        for observer in &observers {
            observer(change.clone());
        }

        if let Ok(payload) = serde_json::to_value(&change) {
            self.bus.emit(event_names::SAFETY_STATE_CHANGED, payload);
        }
    }
}

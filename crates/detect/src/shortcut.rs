//! Keyboard chord detector.

use crate::KeyInput;
use echoexit_config::ShortcutChord;
use echoexit_events::{TriggerEvent, TriggerKind};

/// Watches key-down events for the configured chord.
///
/// Stateless beyond the configured chord: every key-down is matched on
/// its own. Held keys are not debounced — if the platform emits repeat
/// key-down events the detector fires repeatedly, and the state
/// machine's single-cycle guard absorbs the extras.
#[derive(Debug, Clone)]
pub struct ShortcutDetector {
    chord: ShortcutChord,
}

impl ShortcutDetector {
    pub fn new(chord: ShortcutChord) -> Self {
        Self { chord }
    }

    /// Feed one key-down event; returns a fire signal on a chord match.
    pub fn on_key_down(&self, input: &KeyInput) -> Option<TriggerEvent> {
        let pressed = ShortcutChord::new(
            input.ctrl,
            input.meta,
            input.alt,
            input.shift,
            input.key.clone(),
        );
        if self.chord.matches(&pressed) {
            tracing::debug!(chord = %self.chord.canonical(), "shortcut chord matched");
            return Some(TriggerEvent::new(TriggerKind::Shortcut, input.ts_ms));
        }
        None
    }
}

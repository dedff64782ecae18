//! Safe-word detector over tracked free text.

use echoexit_events::{TriggerEvent, TriggerKind};

/// Case-insensitive substring watch on the full content of a tracked
/// input (not a diff).
///
/// Fires on every text change where the phrase is present, so it
/// re-fires while the phrase stays in the text across edits. That is a
/// documented consequence of full-content search; the state machine's
/// single-fire-per-cycle guard makes the repeats harmless.
#[derive(Debug, Clone)]
pub struct KeywordDetector {
    phrase_lower: String,
}

impl KeywordDetector {
    /// Returns `None` for an empty (or whitespace-only) phrase: an
    /// empty safe word must never auto-match.
    pub fn new(phrase: &str) -> Option<Self> {
        if phrase.trim().is_empty() {
            return None;
        }
        Some(Self {
            phrase_lower: phrase.to_lowercase(),
        })
    }

    /// Feed the full current text of the tracked input.
    pub fn on_text_changed(&self, text: &str, ts_ms: i64) -> Option<TriggerEvent> {
        if text.to_lowercase().contains(&self.phrase_lower) {
            tracing::debug!("safe word present in tracked text");
            return Some(TriggerEvent::new(TriggerKind::Keyword, ts_ms));
        }
        None
    }
}

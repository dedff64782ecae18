//! Keyboard chord representation and canonicalization.

use serde::{Deserialize, Serialize};

/// A modifier-set plus key, e.g. Shift+Alt+S.
///
/// Comparison always goes through the canonical form so that
/// "Shift+Alt+S", "shift+alt+s" and "ShiftAltS" all describe the same
/// chord regardless of separator or modifier ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutChord {
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    /// Non-modifier key, stored as typed (canonicalization uppercases).
    pub key: String,
}

impl ShortcutChord {
    pub fn new(ctrl: bool, meta: bool, alt: bool, shift: bool, key: impl Into<String>) -> Self {
        Self {
            ctrl,
            meta,
            alt,
            shift,
            key: key.into(),
        }
    }

    /// Canonical separator-free representation: modifiers in fixed
    /// order (Ctrl, Meta, Alt, Shift) followed by the uppercased key.
    pub fn canonical(&self) -> String {
        let mut out = String::new();
        if self.ctrl {
            out.push_str("Ctrl");
        }
        if self.meta {
            out.push_str("Meta");
        }
        if self.alt {
            out.push_str("Alt");
        }
        if self.shift {
            out.push_str("Shift");
        }
        out.push_str(&self.key.to_uppercase());
        out
    }

    /// Whether a pressed chord matches this one.
    pub fn matches(&self, other: &ShortcutChord) -> bool {
        !self.key.is_empty() && self.canonical() == other.canonical()
    }

    /// Parse a user-facing chord string like "Shift+Alt+S" or
    /// "ShiftAltS". Returns `None` when no non-modifier key remains.
    pub fn parse(input: &str) -> Option<Self> {
        let stripped: String = input.chars().filter(|c| *c != '+' && *c != ' ').collect();
        let mut rest = stripped.as_str();
        let mut chord = Self::new(false, false, false, false, "");

        loop {
            let lower = rest.to_lowercase();
            if lower.starts_with("ctrl") {
                chord.ctrl = true;
                rest = &rest[4..];
            } else if lower.starts_with("control") {
                chord.ctrl = true;
                rest = &rest[7..];
            } else if lower.starts_with("meta") || lower.starts_with("cmd") {
                chord.meta = true;
                rest = &rest[if lower.starts_with("meta") { 4 } else { 3 }..];
            } else if lower.starts_with("alt") {
                chord.alt = true;
                rest = &rest[3..];
            } else if lower.starts_with("shift") {
                chord.shift = true;
                rest = &rest[5..];
            } else {
                break;
            }
        }

        if rest.is_empty() {
            return None;
        }
        chord.key = rest.to_string();
        Some(chord)
    }
}

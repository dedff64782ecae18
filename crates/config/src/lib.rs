//! Per-user safety configuration.
//!
//! The UI shell owns the settings forms; this crate owns the shape,
//! the defaults and the validation rules. A config that fails
//! [`SafetyConfig::validate`] must never reach the detectors — the
//! storage layer enforces this at write time, and the detectors are
//! additionally defensive about the cases that matter (an empty
//! trigger phrase never matches).

mod chord;

pub use chord::ShortcutChord;

use serde::{Deserialize, Serialize};

/// Default multi-click window in milliseconds.
pub const DEFAULT_CLICK_WINDOW_MS: u64 = 2000;

/// Default click-burst threshold.
pub const DEFAULT_CLICK_THRESHOLD: u32 = 5;

/// Per-user safety configuration. Read-only to the core; mutated only
/// through the settings boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Safe word watched for in tracked text (case-insensitive).
    pub trigger_phrase: String,
    /// Keyboard chord that fires the shortcut detector.
    pub shortcut_chord: ShortcutChord,
    /// Clicks required within the window to fire. Must be >= 2.
    pub click_threshold: u32,
    /// Window within which the burst must complete.
    pub click_window_ms: u64,
    /// Phone-number-shaped contact for the dial intent.
    pub contact_number: String,
    /// Whether an accepted trigger also fires the dial intent.
    pub auto_dial_enabled: bool,
    /// Whether the capture pipeline may attempt geolocation.
    pub location_sharing_enabled: bool,
    /// Message template shown/sent alongside an emergency.
    pub emergency_message: String,
    /// Whether the shell should present the psychological lock screen.
    pub lock_on_trigger: bool,
    /// Innocuous URL the shell may navigate a decoy surface to.
    pub decoy_url: String,
    pub shortcut_enabled: bool,
    pub click_burst_enabled: bool,
    pub keyword_enabled: bool,
    pub shake_enabled: bool,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            trigger_phrase: "safety first".to_string(),
            shortcut_chord: ShortcutChord::new(false, false, true, true, "S"),
            click_threshold: DEFAULT_CLICK_THRESHOLD,
            click_window_ms: DEFAULT_CLICK_WINDOW_MS,
            contact_number: "911".to_string(),
            auto_dial_enabled: false,
            location_sharing_enabled: true,
            emergency_message: "Emergency triggered. Please check on me.".to_string(),
            lock_on_trigger: false,
            decoy_url: "https://www.google.com/search?q=weather+update".to_string(),
            shortcut_enabled: true,
            click_burst_enabled: true,
            keyword_enabled: true,
            shake_enabled: true,
        }
    }
}

impl SafetyConfig {
    /// Check the invariants the detectors rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trigger_phrase.trim().is_empty() {
            return Err(ConfigError::EmptyTriggerPhrase);
        }
        if self.click_threshold < 2 {
            return Err(ConfigError::ThresholdTooLow(self.click_threshold));
        }
        if self.click_window_ms == 0 {
            return Err(ConfigError::EmptyClickWindow);
        }
        if self.shortcut_chord.key.trim().is_empty() {
            return Err(ConfigError::EmptyChordKey);
        }
        Ok(())
    }
}

/// Validation failures for [`SafetyConfig`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("trigger phrase must not be empty")]
    EmptyTriggerPhrase,
    #[error("click threshold must be at least 2 (got {0})")]
    ThresholdTooLow(u32),
    #[error("click window must be non-zero")]
    EmptyClickWindow,
    #[error("shortcut chord needs a non-modifier key")]
    EmptyChordKey,
}

/// Repository trait for config persistence, keyed per user.
/// Implemented by the storage layer.
pub trait ConfigRepository: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    fn save_config(&self, user_id: &str, config: &SafetyConfig) -> Result<(), Self::Error>;
    fn load_config(&self, user_id: &str) -> Result<Option<SafetyConfig>, Self::Error>;
}

//! Discreet trigger detectors for the safety core.
//!
//! Four passive detectors, each watching one input channel and
//! independent of the others:
//! - [`ShortcutDetector`] — keyboard chord matching
//! - [`ClickBurstDetector`] — click-rate counting on one element
//! - [`KeywordDetector`] — safe-word substring watch on free text
//! - [`MotionDetector`] — accelerometer-delta thresholding
//!
//! The host shell routes its raw events (key-down, click, text-change,
//! motion sample) into [`DetectorSet`], which returns each detector's
//! fire signal to the caller; the wiring layer forwards fires to a
//! single [`TriggerCallback`]. Detectors carry the host event
//! timestamp (`ts_ms`) on the DTOs rather than reading the clock,
//! which keeps them deterministic under test.

mod clicks;
mod keyword;
mod motion;
mod shortcut;

pub use clicks::ClickBurstDetector;
pub use keyword::KeywordDetector;
pub use motion::{MotionDetector, EVAL_INTERVAL_MS, SHAKE_THRESHOLD, SPEED_SCALE};
pub use shortcut::ShortcutDetector;

use echoexit_config::SafetyConfig;
use echoexit_events::TriggerEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One key-down event as delivered by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInput {
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub shift: bool,
    /// Non-modifier key as reported (case preserved).
    pub key: String,
    /// Host event timestamp in milliseconds.
    pub ts_ms: i64,
}

/// One device-acceleration sample (gravity component included).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub ts_ms: i64,
}

/// Outcome of the host's one-time motion-permission request.
///
/// `Denied` leaves the motion detector unarmed and silently inert —
/// there is no retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPermission {
    Granted,
    Denied,
}

/// Callback invoked with every fire signal.
///
/// Owned by the wiring layer, not by [`DetectorSet`]: the set only
/// returns signals, so the owner can release any lock guarding the
/// detectors before the callback runs.
pub type TriggerCallback = Arc<dyn Fn(TriggerEvent) + Send + Sync + 'static>;

pub fn new_callback<F>(f: F) -> TriggerCallback
where
    F: Fn(TriggerEvent) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The set of armed detectors for one user session.
///
/// A detector disabled in the config (or denied permission, for
/// motion) is absent here, not merely ignored: its channel's events
/// fall through without any evaluation.
pub struct DetectorSet {
    shortcut: Option<ShortcutDetector>,
    clicks: Option<ClickBurstDetector>,
    keyword: Option<KeywordDetector>,
    motion: Option<MotionDetector>,
}

impl DetectorSet {
    /// Arm detectors from the config.
    pub fn new(config: &SafetyConfig, motion_permission: MotionPermission) -> Self {
        let mut set = Self {
            shortcut: None,
            clicks: None,
            keyword: None,
            motion: None,
        };
        set.rearm(config, motion_permission);
        set
    }

    /// Tear down and rebuild the detectors after a config change.
    pub fn rearm(&mut self, config: &SafetyConfig, motion_permission: MotionPermission) {
        self.shortcut = config
            .shortcut_enabled
            .then(|| ShortcutDetector::new(config.shortcut_chord.clone()));

        self.clicks = config
            .click_burst_enabled
            .then(|| ClickBurstDetector::new(config.click_threshold, config.click_window_ms));

        // KeywordDetector::new refuses an empty phrase, so an invalid
        // config degrades to an unarmed detector rather than one that
        // matches everything.
        self.keyword = if config.keyword_enabled {
            KeywordDetector::new(&config.trigger_phrase)
        } else {
            None
        };

        self.motion = match (config.shake_enabled, motion_permission) {
            (true, MotionPermission::Granted) => Some(MotionDetector::new()),
            (true, MotionPermission::Denied) => {
                tracing::debug!("motion permission denied, shake detector stays inert");
                None
            }
            (false, _) => None,
        };

        tracing::info!(
            shortcut = self.shortcut.is_some(),
            clicks = self.clicks.is_some(),
            keyword = self.keyword.is_some(),
            motion = self.motion.is_some(),
            "detectors armed"
        );
    }

    pub fn on_key_down(&self, input: &KeyInput) -> Option<TriggerEvent> {
        self.shortcut.as_ref().and_then(|d| d.on_key_down(input))
    }

    pub fn on_click(&mut self, ts_ms: i64) -> Option<TriggerEvent> {
        self.clicks.as_mut().and_then(|d| d.on_click(ts_ms))
    }

    pub fn on_text_changed(&self, text: &str, ts_ms: i64) -> Option<TriggerEvent> {
        self.keyword
            .as_ref()
            .and_then(|d| d.on_text_changed(text, ts_ms))
    }

    pub fn on_motion(&mut self, sample: &MotionSample) -> Option<TriggerEvent> {
        self.motion.as_mut().and_then(|d| d.on_sample(sample))
    }
}

//! Device-shake detector over accelerometer samples.

use crate::MotionSample;
use echoexit_events::{TriggerEvent, TriggerKind};

/// G-force threshold above which a shake fires.
pub const SHAKE_THRESHOLD: f64 = 15.0;

/// Scale constant applied to the per-millisecond acceleration delta.
pub const SPEED_SCALE: f64 = 10_000.0;

/// Minimum spacing between evaluated samples.
pub const EVAL_INTERVAL_MS: i64 = 100;

/// Thresholds the delta of acceleration samples (gravity included).
///
/// Evaluation is throttled to once per [`EVAL_INTERVAL_MS`];
/// intermediate samples are dropped. The first sample only establishes
/// the baseline.
#[derive(Debug)]
pub struct MotionDetector {
    last_eval_ts_ms: i64,
    last_sum: f64,
}

impl MotionDetector {
    pub fn new() -> Self {
        Self {
            last_eval_ts_ms: 0,
            last_sum: 0.0,
        }
    }

    /// Feed one acceleration sample.
    pub fn on_sample(&mut self, sample: &MotionSample) -> Option<TriggerEvent> {
        if self.last_eval_ts_ms == 0 {
            self.last_eval_ts_ms = sample.ts_ms;
            self.last_sum = sample.x + sample.y + sample.z;
            return None;
        }

        let dt_ms = sample.ts_ms - self.last_eval_ts_ms;
        if dt_ms <= EVAL_INTERVAL_MS {
            return None;
        }

        let sum = sample.x + sample.y + sample.z;
        let speed = (sum - self.last_sum).abs() / dt_ms as f64 * SPEED_SCALE;

        self.last_eval_ts_ms = sample.ts_ms;
        self.last_sum = sum;

        if speed > SHAKE_THRESHOLD {
            tracing::debug!(speed, "shake detected");
            return Some(TriggerEvent::new(TriggerKind::Motion, sample.ts_ms));
        }
        None
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

//! Click-burst detector for one watched UI element.

use echoexit_events::{TriggerEvent, TriggerKind};

/// Counts clicks on a single element and fires when the configured
/// number lands inside the configured window.
///
/// A gap longer than the window resets the burst (the late click
/// counts as the start of a new one). Reaching the threshold fires and
/// zeroes the count.
#[derive(Debug)]
pub struct ClickBurstDetector {
    threshold: u32,
    window_ms: u64,
    click_count: u32,
    last_click_ts_ms: i64,
}

impl ClickBurstDetector {
    pub fn new(threshold: u32, window_ms: u64) -> Self {
        Self {
            threshold,
            window_ms,
            click_count: 0,
            last_click_ts_ms: 0,
        }
    }

    /// Feed one click with its host timestamp.
    pub fn on_click(&mut self, ts_ms: i64) -> Option<TriggerEvent> {
        if ts_ms.saturating_sub(self.last_click_ts_ms) > self.window_ms as i64 {
            self.click_count = 1;
        } else {
            self.click_count += 1;
        }
        self.last_click_ts_ms = ts_ms;

        if self.click_count >= self.threshold {
            self.click_count = 0;
            tracing::debug!(threshold = self.threshold, "click burst completed");
            return Some(TriggerEvent::new(TriggerKind::ClickBurst, ts_ms));
        }
        None
    }
}

//! The safety core: wiring between detectors, state machine and
//! capture pipeline.
//!
//! [`SafetyCore`] is an explicitly constructed object — no ambient
//! singletons. The UI shell builds one per signed-in user, routes its
//! raw input events into it, observes [`echoexit_events::SafetyState`]
//! out of it, and otherwise stays out of the way.
//!
//! ```text
//! host events ──► DetectorSet ──► fire ──► SafetyStateMachine
//!                                              │ Accepted
//!                                              ▼
//!                                    CapturePipeline (spawned)
//!                                              │
//!                               EmergencyLog append + dial intent
//! ```

mod machine;

pub use machine::{SafetyStateMachine, StateObserver, TriggerDecision};

use echoexit_capture::CapturePipeline;
use echoexit_config::{ConfigError, SafetyConfig};
use echoexit_detect::{
    new_callback, DetectorSet, KeyInput, MotionPermission, MotionSample, TriggerCallback,
};
use echoexit_events::{EmergencyLogRepository, EventBusRef, SafetyState};
use std::sync::{Arc, Mutex};

/// One user's safety core.
///
/// Holds the config, the armed detectors, the state machine and the
/// capture pipeline. All input-feeding methods are cheap and
/// synchronous; the only asynchronous work (the capture) is spawned
/// fire-and-forget so the host's event dispatch never blocks on
/// geolocation or storage.
pub struct SafetyCore<R: EmergencyLogRepository + 'static> {
    user_id: String,
    config: Arc<Mutex<SafetyConfig>>,
    machine: Arc<SafetyStateMachine>,
    pipeline: Arc<CapturePipeline<R>>,
    detectors: Mutex<DetectorSet>,
    callback: TriggerCallback,
    motion_permission: MotionPermission,
}

impl<R: EmergencyLogRepository + 'static> SafetyCore<R> {
    /// Build and arm a safety core.
    ///
    /// Must be called from within a tokio runtime: the core captures
    /// the runtime handle it will spawn captures on.
    ///
    /// # Errors
    ///
    /// Rejects a config that fails [`SafetyConfig::validate`]; an
    /// invalid config must never reach the detectors.
    pub fn new(
        user_id: impl Into<String>,
        config: SafetyConfig,
        pipeline: CapturePipeline<R>,
        bus: EventBusRef,
        motion_permission: MotionPermission,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let user_id = user_id.into();
        let machine = Arc::new(SafetyStateMachine::new(bus));
        let pipeline = Arc::new(pipeline);
        let config = Arc::new(Mutex::new(config));
        let runtime = tokio::runtime::Handle::current();

        let callback = {
            let machine = Arc::clone(&machine);
            let pipeline = Arc::clone(&pipeline);
            let config = Arc::clone(&config);
            let user_id = user_id.clone();
            new_callback(move |event| {
                if machine.on_trigger_event(event) != TriggerDecision::Accepted {
                    return;
                }
                // The state commitment above is unconditional; the
                // capture runs detached and only logs its failures.
                let pipeline = Arc::clone(&pipeline);
                let snapshot = config.lock().expect("config mutex poisoned").clone();
                let user_id = user_id.clone();
                runtime.spawn(async move {
                    if let Err(e) = pipeline.capture(&user_id, &snapshot).await {
                        tracing::warn!(error = %e, "context capture failed, secure mode unaffected");
                    }
                });
            })
        };

        let detectors = {
            let config = config.lock().expect("config mutex poisoned");
            Mutex::new(DetectorSet::new(&config, motion_permission))
        };

        Ok(Self {
            user_id,
            config,
            machine,
            pipeline,
            detectors,
            callback,
            motion_permission,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> SafetyState {
        self.machine.state()
    }

    /// Register an observer for every state change.
    pub fn subscribe(&self, observer: StateObserver) {
        self.machine.subscribe(observer);
    }

    /// Current config snapshot.
    pub fn config(&self) -> SafetyConfig {
        self.config.lock().expect("config mutex poisoned").clone()
    }

    /// Replace the config and rearm the detectors.
    pub fn update_config(&self, new_config: SafetyConfig) -> Result<(), ConfigError> {
        new_config.validate()?;
        {
            let mut config = self.config.lock().expect("config mutex poisoned");
            *config = new_config.clone();
        }
        self.detectors
            .lock()
            .expect("detector mutex poisoned")
            .rearm(&new_config, self.motion_permission);
        Ok(())
    }

    /// Leave SecureMode.
    ///
    /// Callers MUST authenticate the user (PIN/password in the shell)
    /// before invoking this; the core only documents that
    /// precondition, it does not check credentials itself.
    pub fn reset(&self) -> bool {
        self.machine.reset()
    }

    // --- Input routing (called by the shell's event handlers) ---
    //
    // The detector guard is dropped before the fire callback runs, so
    // a state observer may synchronously feed input back into the core
    // without self-deadlocking on the detector lock.

    pub fn on_key_down(&self, input: &KeyInput) {
        let fired = self
            .detectors
            .lock()
            .expect("detector mutex poisoned")
            .on_key_down(input);
        if let Some(event) = fired {
            (self.callback)(event);
        }
    }

    pub fn on_click(&self, ts_ms: i64) {
        let fired = self
            .detectors
            .lock()
            .expect("detector mutex poisoned")
            .on_click(ts_ms);
        if let Some(event) = fired {
            (self.callback)(event);
        }
    }

    pub fn on_text_changed(&self, text: &str, ts_ms: i64) {
        let fired = self
            .detectors
            .lock()
            .expect("detector mutex poisoned")
            .on_text_changed(text, ts_ms);
        if let Some(event) = fired {
            (self.callback)(event);
        }
    }

    pub fn on_motion(&self, sample: &MotionSample) {
        let fired = self
            .detectors
            .lock()
            .expect("detector mutex poisoned")
            .on_motion(sample);
        if let Some(event) = fired {
            (self.callback)(event);
        }
    }

    /// The pipeline, for shells that want to read its configuration.
    pub fn pipeline(&self) -> &CapturePipeline<R> {
        &self.pipeline
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echoexit_capture::{NullProvider, RecordingDialer};
    use echoexit_events::{EmergencyRecord, MemoryLog, NullBus};
    use std::time::Duration;

    fn core_with_log(
        config: SafetyConfig,
        log: Arc<MemoryLog>,
    ) -> SafetyCore<MemoryLog> {
        let pipeline = CapturePipeline::new(
            Arc::new(NullProvider),
            Arc::new(NullProvider),
            Arc::new(RecordingDialer::new()),
            log,
            Arc::new(NullBus),
        );
        SafetyCore::new(
            "alice",
            config,
            pipeline,
            Arc::new(NullBus),
            MotionPermission::Denied,
        )
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_burst_of_fires_appends_exactly_one_record() {
        let log = Arc::new(MemoryLog::new());
        let core = core_with_log(SafetyConfig::default(), Arc::clone(&log));

        // Keyword fires first; the click burst right behind it must be
        // a no-op.
        core.on_text_changed("note to self: safety first", 0);
        for i in 0..5 {
            core.on_click(10 + i * 10);
        }
        assert_eq!(core.state(), SafetyState::SecureMode);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(log.len(), 1, "exactly one capture per cycle");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_storage_failure_leaves_secure_mode_active() {
        #[derive(Debug, thiserror::Error)]
        #[error("quota exceeded")]
        struct QuotaExceeded;

        struct FullLog;

        impl EmergencyLogRepository for FullLog {
            type Error = QuotaExceeded;

            fn append(&self, _: &str, _: &EmergencyRecord) -> Result<(), QuotaExceeded> {
                Err(QuotaExceeded)
            }

            fn list_for_user(&self, _: &str) -> Result<Vec<EmergencyRecord>, QuotaExceeded> {
                Ok(Vec::new())
            }
        }

        let pipeline = CapturePipeline::new(
            Arc::new(NullProvider),
            Arc::new(NullProvider),
            Arc::new(RecordingDialer::new()),
            Arc::new(FullLog),
            Arc::new(NullBus),
        );
        let core = SafetyCore::new(
            "alice",
            SafetyConfig::default(),
            pipeline,
            Arc::new(NullBus),
            MotionPermission::Denied,
        )
        .unwrap();

        core.on_text_changed("safety first", 0);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(core.state(), SafetyState::SecureMode);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_at_construction() {
        let config = SafetyConfig {
            click_threshold: 1,
            ..Default::default()
        };
        let pipeline = CapturePipeline::new(
            Arc::new(NullProvider),
            Arc::new(NullProvider),
            Arc::new(RecordingDialer::new()),
            Arc::new(MemoryLog::new()),
            Arc::new(NullBus),
        );
        let result = SafetyCore::new(
            "alice",
            config,
            pipeline,
            Arc::new(NullBus),
            MotionPermission::Denied,
        );
        assert!(matches!(result, Err(ConfigError::ThresholdTooLow(1))));
    }

    #[tokio::test]
    async fn test_update_config_validates_and_rearms() {
        let log = Arc::new(MemoryLog::new());
        let core = core_with_log(SafetyConfig::default(), log);

        let bad = SafetyConfig {
            trigger_phrase: String::new(),
            ..Default::default()
        };
        assert!(core.update_config(bad).is_err());
        assert_eq!(core.config().trigger_phrase, "safety first");

        let relabelled = SafetyConfig {
            trigger_phrase: "exit now".to_string(),
            ..Default::default()
        };
        core.update_config(relabelled).unwrap();

        // Old phrase no longer matches; new one does.
        core.on_text_changed("safety first", 0);
        assert_eq!(core.state(), SafetyState::Idle);
        core.on_text_changed("exit now", 1);
        assert_eq!(core.state(), SafetyState::SecureMode);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_observer_may_redispatch_input_synchronously() {
        let log = Arc::new(MemoryLog::new());
        let core = Arc::new(core_with_log(SafetyConfig::default(), Arc::clone(&log)));

        // A shell that reacts to a state change by routing more host
        // events into the core must come straight back out.
        let core_inner = Arc::clone(&core);
        core.subscribe(Arc::new(move |_| {
            core_inner.on_click(999);
            core_inner.on_text_changed("safety first", 999);
        }));

        core.on_text_changed("safety first", 0);
        assert_eq!(core.state(), SafetyState::SecureMode);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(log.len(), 1, "re-dispatched input opened no second cycle");
    }

    #[tokio::test]
    async fn test_reset_reopens_the_machine() {
        let log = Arc::new(MemoryLog::new());
        let core = core_with_log(SafetyConfig::default(), Arc::clone(&log));

        core.on_text_changed("safety first", 0);
        assert_eq!(core.state(), SafetyState::SecureMode);
        assert!(core.reset());
        assert_eq!(core.state(), SafetyState::Idle);

        core.on_text_changed("safety first again", 1);
        assert_eq!(core.state(), SafetyState::SecureMode);
    }
}

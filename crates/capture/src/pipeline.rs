//! The capture pipeline proper.

use crate::provider::{DeviceInfoProvider, DialHandler, LocationProvider};
use chrono::Utc;
use echoexit_config::SafetyConfig;
use echoexit_events::{
    event_names, EmergencyLogRepository, EmergencyRecord, EventBusRef, LOCATION_NOT_ENABLED,
    LOCATION_UNAVAILABLE,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Default bound on the location lookup.
///
/// Bounds as short as 100ms risk never resolving on real hardware (a
/// cold GPS fix takes longer than that); 3 seconds keeps the record
/// useful without holding the capture open noticeably.
pub const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_millis(3000);

/// Failures the pipeline reports to its spawning task.
///
/// By the time one of these surfaces the state machine has already
/// committed to SecureMode; the caller only logs it.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to append emergency record: {0}")]
    Storage(String),
}

/// Produces and persists one [`EmergencyRecord`] per accepted trigger.
pub struct CapturePipeline<R: EmergencyLogRepository> {
    location: Arc<dyn LocationProvider>,
    device: Arc<dyn DeviceInfoProvider>,
    dialer: Arc<dyn DialHandler>,
    log: Arc<R>,
    bus: EventBusRef,
    location_timeout: Duration,
}

impl<R: EmergencyLogRepository> CapturePipeline<R> {
    pub fn new(
        location: Arc<dyn LocationProvider>,
        device: Arc<dyn DeviceInfoProvider>,
        dialer: Arc<dyn DialHandler>,
        log: Arc<R>,
        bus: EventBusRef,
    ) -> Self {
        Self {
            location,
            device,
            dialer,
            log,
            bus,
            location_timeout: DEFAULT_LOCATION_TIMEOUT,
        }
    }

    /// Override the location bound (mostly for tests).
    pub fn with_location_timeout(mut self, timeout: Duration) -> Self {
        self.location_timeout = timeout;
        self
    }

    /// Assemble, persist and announce one emergency record.
    ///
    /// Total latency is bounded by the location timeout plus cheap
    /// synchronous work. The dial intent is fired before the location
    /// wait so it never queues behind a slow lookup.
    pub async fn capture(
        &self,
        user_id: &str,
        config: &SafetyConfig,
    ) -> Result<EmergencyRecord, CaptureError> {
        let recorded_at = Utc::now();
        let device = self.device.snapshot();

        if config.auto_dial_enabled {
            tracing::info!("firing dial intent");
            self.dialer.dial(&config.contact_number);
        }

        let location = self.resolve_location(config).await;

        let record = EmergencyRecord {
            id: Uuid::new_v4(),
            recorded_at,
            location,
            device,
        };

        self.log
            .append(user_id, &record)
            .map_err(|e| CaptureError::Storage(e.to_string()))?;

        tracing::info!(record_id = %record.id, location = %record.location, "emergency record appended");
        if let Ok(payload) = serde_json::to_value(&record) {
            self.bus.emit(event_names::EMERGENCY_RECORDED, payload);
        }

        Ok(record)
    }

    /// Race the platform lookup against the timeout. The losing
    /// in-flight lookup is abandoned, not cancelled.
    async fn resolve_location(&self, config: &SafetyConfig) -> String {
        if !config.location_sharing_enabled {
            return LOCATION_NOT_ENABLED.to_string();
        }

        match tokio::time::timeout(self.location_timeout, self.location.current_position()).await {
            Ok(Ok(position)) => position.to_pair(),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "location lookup failed");
                LOCATION_UNAVAILABLE.to_string()
            }
            Err(_) => {
                tracing::debug!(
                    timeout_ms = self.location_timeout.as_millis() as u64,
                    "location lookup timed out"
                );
                LOCATION_UNAVAILABLE.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{
        FixedLocation, LocationError, NullProvider, PendingLocation, Position, RecordingDialer,
    };
    use async_trait::async_trait;
    use echoexit_events::{MemoryBus, MemoryLog, NullBus};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn pipeline_with(
        location: Arc<dyn LocationProvider>,
        dialer: Arc<dyn DialHandler>,
        log: Arc<MemoryLog>,
        bus: EventBusRef,
    ) -> CapturePipeline<MemoryLog> {
        CapturePipeline::new(location, Arc::new(NullProvider), dialer, log, bus)
    }

    #[tokio::test]
    async fn test_never_resolving_lookup_still_completes() {
        let log = Arc::new(MemoryLog::new());
        let pipeline = pipeline_with(
            Arc::new(PendingLocation),
            Arc::new(NullProvider),
            Arc::clone(&log),
            Arc::new(NullBus),
        )
        .with_location_timeout(Duration::from_millis(100));

        let record = pipeline
            .capture("alice", &SafetyConfig::default())
            .await
            .unwrap();

        assert_eq!(record.location, LOCATION_UNAVAILABLE);
        assert_eq!(log.len(), 1, "record appended despite missing location");
    }

    #[tokio::test]
    async fn test_timeout_is_a_wall_clock_bound() {
        let pipeline = pipeline_with(
            Arc::new(PendingLocation),
            Arc::new(NullProvider),
            Arc::new(MemoryLog::new()),
            Arc::new(NullBus),
        )
        .with_location_timeout(Duration::from_millis(100));

        let started = Instant::now();
        pipeline
            .capture("alice", &SafetyConfig::default())
            .await
            .unwrap();
        assert!(
            started.elapsed() < Duration::from_millis(1000),
            "capture must finish within timeout + ε"
        );
    }

    #[tokio::test]
    async fn test_resolved_position_lands_in_record() {
        let log = Arc::new(MemoryLog::new());
        let bus = Arc::new(MemoryBus::new());
        let pipeline = pipeline_with(
            Arc::new(FixedLocation(Position {
                latitude: 41.385064,
                longitude: 2.173404,
            })),
            Arc::new(NullProvider),
            Arc::clone(&log),
            bus.clone(),
        );

        let record = pipeline
            .capture("alice", &SafetyConfig::default())
            .await
            .unwrap();

        assert_eq!(record.location, "41.385064,2.173404");
        let announced = bus.last_for(event_names::EMERGENCY_RECORDED).unwrap();
        assert_eq!(announced.payload["location"], "41.385064,2.173404");
    }

    #[tokio::test]
    async fn test_sharing_disabled_skips_lookup() {
        struct CountingLocation(AtomicUsize);

        #[async_trait]
        impl LocationProvider for CountingLocation {
            async fn current_position(&self) -> Result<Position, LocationError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(LocationError::Unavailable("unused".into()))
            }
        }

        let counter = Arc::new(CountingLocation(AtomicUsize::new(0)));
        let pipeline = pipeline_with(
            counter.clone(),
            Arc::new(NullProvider),
            Arc::new(MemoryLog::new()),
            Arc::new(NullBus),
        );

        let config = SafetyConfig {
            location_sharing_enabled: false,
            ..Default::default()
        };
        let record = pipeline.capture("alice", &config).await.unwrap();

        assert_eq!(record.location, LOCATION_NOT_ENABLED);
        assert_eq!(counter.0.load(Ordering::SeqCst), 0, "lookup never started");
    }

    #[tokio::test]
    async fn test_permission_denial_degrades_to_sentinel() {
        struct DeniedLocation;

        #[async_trait]
        impl LocationProvider for DeniedLocation {
            async fn current_position(&self) -> Result<Position, LocationError> {
                Err(LocationError::PermissionDenied)
            }
        }

        let pipeline = pipeline_with(
            Arc::new(DeniedLocation),
            Arc::new(NullProvider),
            Arc::new(MemoryLog::new()),
            Arc::new(NullBus),
        );

        let record = pipeline
            .capture("alice", &SafetyConfig::default())
            .await
            .unwrap();
        assert_eq!(record.location, LOCATION_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_auto_dial_uses_configured_number() {
        let dialer = Arc::new(RecordingDialer::new());
        let pipeline = pipeline_with(
            Arc::new(NullProvider),
            dialer.clone(),
            Arc::new(MemoryLog::new()),
            Arc::new(NullBus),
        );

        let config = SafetyConfig {
            auto_dial_enabled: true,
            contact_number: "+34600111222".to_string(),
            ..Default::default()
        };
        pipeline.capture("alice", &config).await.unwrap();
        assert_eq!(dialer.dialed(), vec!["+34600111222"]);
    }

    #[tokio::test]
    async fn test_dial_disabled_by_default() {
        let dialer = Arc::new(RecordingDialer::new());
        let pipeline = pipeline_with(
            Arc::new(NullProvider),
            dialer.clone(),
            Arc::new(MemoryLog::new()),
            Arc::new(NullBus),
        );

        pipeline
            .capture("alice", &SafetyConfig::default())
            .await
            .unwrap();
        assert!(dialer.dialed().is_empty());
    }
}

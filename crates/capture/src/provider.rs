//! Provider traits for the platform facilities the pipeline needs.
//!
//! These traits abstract the host shell's platform bindings
//! (geolocation API, user agent, tel: handoff), allowing the pipeline
//! to remain pure and testable.

use async_trait::async_trait;
use echoexit_events::DeviceSnapshot;
use std::sync::Mutex;

/// A resolved geographic position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    /// "lat,long" at full platform precision.
    pub fn to_pair(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

/// Failures a platform location lookup can report.
#[derive(Debug, thiserror::Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Provider for a one-shot platform location lookup.
///
/// The pipeline races this against its timeout; implementations need
/// not support cancellation — a lookup that loses the race is simply
/// abandoned.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_position(&self) -> Result<Position, LocationError>;
}

/// Provider for the cheap, synchronous device snapshot.
pub trait DeviceInfoProvider: Send + Sync {
    fn snapshot(&self) -> DeviceSnapshot;
}

/// Handler for the dial intent: a best-effort "open this phone-number
/// handoff" with no return value and no confirmation. The host must
/// perform it without navigating the visible document away (the shell
/// uses a transient off-screen surface).
pub trait DialHandler: Send + Sync {
    fn dial(&self, number: &str);
}

/// Null implementations for testing or headless use.
pub struct NullProvider;

#[async_trait]
impl LocationProvider for NullProvider {
    async fn current_position(&self) -> Result<Position, LocationError> {
        Err(LocationError::Unavailable("no platform binding".into()))
    }
}

impl DeviceInfoProvider for NullProvider {
    fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot::default()
    }
}

impl DialHandler for NullProvider {
    fn dial(&self, _number: &str) {
        // Intentionally empty
    }
}

/// Location provider that always resolves to a fixed position.
pub struct FixedLocation(pub Position);

#[async_trait]
impl LocationProvider for FixedLocation {
    async fn current_position(&self) -> Result<Position, LocationError> {
        Ok(self.0)
    }
}

/// Location provider that never resolves, for exercising the timeout
/// path.
pub struct PendingLocation;

#[async_trait]
impl LocationProvider for PendingLocation {
    async fn current_position(&self) -> Result<Position, LocationError> {
        std::future::pending().await
    }
}

/// Dial handler that records every number it was asked to dial.
#[derive(Default)]
pub struct RecordingDialer {
    numbers: Mutex<Vec<String>>,
}

impl RecordingDialer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dialed(&self) -> Vec<String> {
        self.numbers.lock().unwrap().clone()
    }
}

impl DialHandler for RecordingDialer {
    fn dial(&self, number: &str) {
        self.numbers.lock().unwrap().push(number.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_pair_keeps_full_precision() {
        let pos = Position {
            latitude: 41.385063999,
            longitude: 2.173404001,
        };
        assert_eq!(pos.to_pair(), "41.385063999,2.173404001");
    }

    #[tokio::test]
    async fn test_null_provider_is_unavailable() {
        let result = NullProvider.current_position().await;
        assert!(matches!(result, Err(LocationError::Unavailable(_))));
    }

    #[test]
    fn test_recording_dialer() {
        let dialer = RecordingDialer::new();
        dialer.dial("911");
        dialer.dial("+34600000000");
        assert_eq!(dialer.dialed(), vec!["911", "+34600000000"]);
    }
}

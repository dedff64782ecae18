//! Emergency-context capture pipeline.
//!
//! On an accepted trigger the pipeline assembles one
//! [`echoexit_events::EmergencyRecord`] — timestamp, device snapshot,
//! best-effort location with a hard wall-clock bound — appends it to
//! the emergency log, and fires the dial intent when configured.
//!
//! Every failure in here degrades to a sentinel value or a log line;
//! nothing propagates into the host's event dispatch path and nothing
//! is retried.

mod pipeline;
mod provider;

pub use pipeline::{CaptureError, CapturePipeline, DEFAULT_LOCATION_TIMEOUT};
pub use provider::{
    DeviceInfoProvider, DialHandler, FixedLocation, LocationError, LocationProvider, NullProvider,
    PendingLocation, Position, RecordingDialer,
};

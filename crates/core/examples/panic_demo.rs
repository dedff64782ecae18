//! Headless demo: wire a safety core, simulate a click burst, print
//! the resulting emergency log.
//!
//! ```sh
//! cargo run -p echoexit-core --example panic_demo
//! ```

use echoexit_capture::{CapturePipeline, NullProvider, RecordingDialer};
use echoexit_config::{ConfigRepository, SafetyConfig};
use echoexit_core::SafetyCore;
use echoexit_detect::MotionPermission;
use echoexit_events::{EmergencyLogRepository, MemoryBus};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let db = Arc::new(echoexit_storage::Database::open_in_memory()?);
    let dialer = Arc::new(RecordingDialer::new());
    let bus = Arc::new(MemoryBus::new());

    let config = SafetyConfig {
        auto_dial_enabled: true,
        contact_number: "+34600111222".to_string(),
        ..Default::default()
    };
    db.save_config("demo", &config)?;

    let pipeline = CapturePipeline::new(
        Arc::new(NullProvider),
        Arc::new(NullProvider),
        dialer.clone(),
        Arc::clone(&db),
        bus.clone(),
    );
    let core = SafetyCore::new("demo", config, pipeline, bus.clone(), MotionPermission::Denied)?;

    core.subscribe(Arc::new(|change| {
        tracing::info!(state = ?change.state, trigger = ?change.trigger, "state changed");
    }));

    tracing::info!("simulating five rapid clicks on the watched element");
    for i in 0..5 {
        core.on_click(i * 100);
    }
    tracing::info!(state = ?core.state(), "after burst");

    tokio::time::sleep(Duration::from_millis(300)).await;

    for record in db.list_for_user("demo")? {
        tracing::info!(
            id = %record.id,
            at = %record.recorded_at,
            location = %record.location,
            "emergency record"
        );
    }
    tracing::info!(dialed = ?dialer.dialed(), "dial intents");

    Ok(())
}

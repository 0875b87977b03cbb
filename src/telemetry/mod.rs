//! Logging bootstrap for the binaries.
//!
//! Library code only emits `tracing` events; installing a subscriber is
//! the entry point's job.

use tracing::info;
use tracing_subscriber::EnvFilter;

/// Configuration for the tracing subscriber installed at process start.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Name of the service, recorded on the startup event.
    pub service_name: String,

    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "conductor".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Fails if a
/// subscriber is already installed.
pub fn init_telemetry(
    config: &TelemetryConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()?;
    info!(service = %config.service_name, "telemetry initialized");
    Ok(())
}

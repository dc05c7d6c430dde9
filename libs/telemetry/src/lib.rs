//! Lightweight helpers for greeter telemetry.
//! Provides subscriber bootstrap, span field helpers and metric recorders.

use anyhow::Result;

mod config;
mod context;
mod metrics;
mod tracing_init;

pub use config::TelemetryConfig;
pub use context::TelemetryLabels;
pub use metrics::{record_counter, with_event_fields};
pub use tracing_init::{init_telemetry, telemetry_initialised};

/// Installs the shared subscriber configured from `RUST_LOG` and `LOG_FORMAT`.
pub fn install(service_name: &str, service_version: &str) -> Result<()> {
    init_telemetry(TelemetryConfig::from_env(service_name, service_version))
}

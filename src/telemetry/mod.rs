//! Telemetry module
//!
//! Logging and metrics for the engine

mod logging;
mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{
    count_alert, count_intent_rejected, count_intent_submitted, count_stop_adjustment,
    gauge_open_positions, gauge_volatility, record_submission_latency,
};

use crate::config::TelemetryConfig;

/// Guard that cleans up telemetry on drop
pub struct TelemetryGuard {
    _priv: (),
}

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    let format = if config.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_logging(&config.log_level, format)?;

    Ok(TelemetryGuard { _priv: () })
}

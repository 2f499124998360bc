//! # Grants Telemetry
//!
//! Logging and metrics for the grants core.
//!
//! ## Components
//!
//! - **Logs**: `tracing-subscriber` with an env filter, human-readable or JSON
//! - **Metrics**: Prometheus counters for isolated failures and outcomes, fed
//!   through [`MetricsObserver`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use grants_telemetry::{init_telemetry, MetricsObserver, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! let observer = std::sync::Arc::new(MetricsObserver);
//! // hand `observer` to the bus, audit recorder, event scopes and engine
//! println!("{}", grants_telemetry::render_metrics()?);
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GC_SERVICE_NAME` | `grants-core` | Service name on log lines |
//! | `GC_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `GC_JSON_LOGS` | `false` | Emit JSON log lines |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    register_metrics, render_metrics, MetricsObserver, AUDIT_WRITE_FAILURES, CHANGE_REQUESTS,
    EVENTS_PUBLISHED, EVENT_PERSIST_FAILURES, SUBSCRIBER_FAILURES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),
}

/// Register metrics, then install the global log subscriber.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    register_metrics()?;
    init_logging(&config)?;
    tracing::info!(
        service = %config.service_name,
        log_level = %config.log_level,
        json_logs = config.json_logs,
        "Telemetry initialized"
    );
    Ok(TelemetryGuard {
        service_name: config.service_name,
    })
}

/// Held for the lifetime of the process.
#[derive(Debug)]
pub struct TelemetryGuard {
    service_name: String,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down telemetry");
    }
}

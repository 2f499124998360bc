//! # Runtime Configuration
//!
//! Aggregates the per-crate configuration structs. Everything has a default;
//! the environment overrides telemetry settings and history deduplication.
//!
//! | Variable | Effect | Default |
//! |----------|--------|---------|
//! | `GC_SERVICE_NAME` | service name on log lines | `grants-core` |
//! | `GC_LOG_LEVEL` / `RUST_LOG` | log filter | `info` |
//! | `GC_JSON_LOGS` | JSON log output | `false` |
//! | `GC_HISTORY_DEDUPLICATE` | skip history entries already derived | `true` |

use std::env;

use gc_01_audit_trail::AuditConfig;
use gc_03_derived_history::HistoryConfig;
use gc_05_change_requests::GatingPolicy;
use grants_telemetry::TelemetryConfig;
use shared_types::CoreError;
use thiserror::Error;

/// Complete runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    pub telemetry: TelemetryConfig,
    pub audit: AuditConfig,
    pub history: HistoryConfig,
    /// Fields that require review before they change.
    pub gating: GatingPolicy,
}

impl RuntimeConfig {
    /// Defaults with the standard gating table.
    pub fn standard() -> Self {
        Self {
            gating: GatingPolicy::default_policy(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::standard();
        config.telemetry = TelemetryConfig::from_lookup(&lookup);
        if let Some(value) = lookup("GC_HISTORY_DEDUPLICATE") {
            config.history.deduplicate = !(value.eq_ignore_ascii_case("false") || value == "0");
        }
        config
    }

    /// Reject configurations the container cannot run with.
    ///
    /// # Returns
    ///
    /// Returns `Err` if:
    /// - the service name is blank
    /// - a gate rule names no fields or no target class
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telemetry.service_name.trim().is_empty() {
            return Err(ConfigError::EmptyServiceName);
        }
        self.gating.validate().map_err(ConfigError::InvalidGating)?;
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("service name must not be empty; set GC_SERVICE_NAME")]
    EmptyServiceName,

    #[error("invalid gating table: {0}")]
    InvalidGating(CoreError),
}

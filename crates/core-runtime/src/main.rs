//! # Grants-Core Runtime
//!
//! Demonstration entry point for the change-tracking core.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Initialize telemetry (metrics registry, log subscriber)
//! 3. Validate configuration and wire the container
//! 4. Run the demonstration scenario
//! 5. Print the CAN history and the metrics exposition

use anyhow::{Context, Result};
use tracing::info;

use core_runtime::demo::{self, CAN_ID};
use core_runtime::{CoreContainer, RuntimeConfig};

fn main() -> Result<()> {
    let config = RuntimeConfig::from_env();
    let _telemetry =
        grants_telemetry::init_telemetry(config.telemetry.clone()).context("telemetry")?;

    let container = CoreContainer::new(config).context("invalid runtime configuration")?;
    info!(container = ?container, "Core container ready");

    let report = demo::run(&container).context("demonstration scenario failed")?;
    info!(
        change_request_id = %report.change_request.id,
        status = %report.change_request.status,
        "Demonstration scenario complete"
    );

    println!("History for CAN {CAN_ID}:");
    for entry in &report.can_history {
        println!("  [{}] {}: {}", entry.timestamp, entry.title, entry.message);
    }
    println!("History for agreement {}:", demo::AGREEMENT_ID);
    for entry in &report.agreement_history {
        println!("  [{}] {}: {}", entry.timestamp, entry.title, entry.message);
    }

    let metrics = grants_telemetry::render_metrics().context("metrics exposition")?;
    println!("\n{metrics}");
    Ok(())
}

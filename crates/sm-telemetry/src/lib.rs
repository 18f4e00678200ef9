//! # Sensor Mesh - Telemetry
//!
//! **Bounded Context:** Logs and metrics of one node
//!
//! ## Purpose
//!
//! One call installs the `tracing` subscriber and registers the node-level
//! Prometheus metrics. Subsystems log through `tracing` with a `[sm-0N]`
//! prefix and register their own counters in the default registry.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sm_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! tracing::info!("[sm-runtime] Node starting");
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `SM_SERVICE_NAME` | `sensor-mesh` | Service name in logs |
//! | `SM_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `SM_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `SM_JSON_LOGS` | `false` (`true` in containers) | JSON lines |

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging};
pub use metrics::{encode_metrics, record_error, register_metrics, MetricsHandle};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Telemetry already initialized: {0}")]
    AlreadyInitialized(String),

    #[error("Metrics initialization failed: {0}")]
    MetricsInit(String),

    #[error("Invalid telemetry configuration: {0}")]
    Config(String),
}

/// Holds telemetry for the lifetime of the node.
#[derive(Debug)]
pub struct TelemetryGuard {
    config: TelemetryConfig,
    _metrics: MetricsHandle,
}

impl TelemetryGuard {
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.config.service_name, "[telemetry] Shutting down");
    }
}

/// Install logging and register metrics.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    init_logging(&config)?;
    let metrics = register_metrics()?;
    Ok(TelemetryGuard {
        config,
        _metrics: metrics,
    })
}

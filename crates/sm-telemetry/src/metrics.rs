//! Node-level Prometheus metrics.
//!
//! Subsystem crates register their own counters in the default registry
//! behind their `metrics` feature. This registry holds the node-wide ones,
//! and [`encode_metrics`] exposes both.

use lazy_static::lazy_static;
use prometheus::{Encoder, Gauge, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::TelemetryError;

lazy_static! {
    /// Registry for node-level metrics.
    pub static ref REGISTRY: Registry = Registry::new();

    /// Nodes currently registered on the shared state.
    pub static ref NODES_CONNECTED: IntGauge = IntGauge::new(
        "sm_nodes_connected",
        "Number of nodes currently registered"
    ).expect("metric creation failed");

    /// RFC calls issued by this node and not yet resolved.
    pub static ref RFC_PENDING: IntGauge = IntGauge::new(
        "sm_rfc_pending_calls",
        "RFC calls awaiting a response"
    ).expect("metric creation failed");

    /// Seconds since the node runtime started.
    pub static ref NODE_UPTIME: Gauge = Gauge::new(
        "sm_node_uptime_seconds",
        "Seconds since the node runtime started"
    ).expect("metric creation failed");

    /// Errors surfaced by subsystems, by subsystem and kind.
    pub static ref SUBSYSTEM_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("sm_subsystem_errors_total", "Errors by subsystem and kind"),
        &["subsystem", "error_type"]
    ).expect("metric creation failed");
}

/// Keeps the registered metrics alive.
#[derive(Debug)]
pub struct MetricsHandle {
    _private: (),
}

/// Register the node-level metrics in [`REGISTRY`].
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(NODES_CONNECTED.clone()),
        Box::new(RFC_PENDING.clone()),
        Box::new(NODE_UPTIME.clone()),
        Box::new(SUBSYSTEM_ERRORS.clone()),
    ];
    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }
    Ok(MetricsHandle { _private: () })
}

/// Count an error of `error_type` raised by `subsystem`.
pub fn record_error(subsystem: &str, error_type: &str) {
    SUBSYSTEM_ERRORS
        .with_label_values(&[subsystem, error_type])
        .inc();
}

/// Render node-level and subsystem metrics in the text exposition format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let mut families = REGISTRY.gather();
    families.extend(prometheus::gather());

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

//! # RFC Bus Metrics
//!
//! Enable with the `metrics` feature.
//!
//! - `rfc_requests_total` - Calls issued, by name
//! - `rfc_failures_total` - Calls settled with an error, by name and kind
//! - `rfc_protocol_violations_total` - Settled envelopes with no pending caller

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Calls issued, labeled by name
    pub static ref RFC_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "rfc_requests_total",
        "Total number of rfc calls issued",
        &["name"]
    )
    .expect("Failed to create RFC_REQUESTS metric");

    /// Calls settled with an error, labeled by name and kind
    pub static ref RFC_FAILURES: IntCounterVec = register_int_counter_vec!(
        "rfc_failures_total",
        "Total number of rfc calls settled with an error",
        &["name", "kind"]
    )
    .expect("Failed to create RFC_FAILURES metric");

    /// Settled envelopes with no pending caller
    pub static ref RFC_PROTOCOL_VIOLATIONS: IntCounter = register_int_counter!(
        "rfc_protocol_violations_total",
        "Settled envelopes addressed to this node with no pending caller"
    )
    .expect("Failed to create RFC_PROTOCOL_VIOLATIONS metric");
}

#[cfg(feature = "metrics")]
pub fn record_request(name: &str) {
    RFC_REQUESTS.with_label_values(&[name]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_failure(name: &str, kind: &str) {
    RFC_FAILURES.with_label_values(&[name, kind]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_protocol_violation() {
    RFC_PROTOCOL_VIOLATIONS.inc();
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_request(_name: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_failure(_name: &str, _kind: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_protocol_violation() {}

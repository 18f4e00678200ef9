//! # Source Factory Metrics
//!
//! Enable with the `metrics` feature.
//!
//! - `source_frames_published_total` - Frames published, by source type
//! - `source_datagrams_dropped_total` - Inbound datagrams dropped, by reason
//! - `source_live` - Sources owned by this process

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter_vec, register_int_gauge, IntCounterVec, IntGauge};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Frames published, labeled by source type
    pub static ref FRAMES_PUBLISHED: IntCounterVec = register_int_counter_vec!(
        "source_frames_published_total",
        "Total number of frames published by sources",
        &["type"]
    )
    .expect("Failed to create FRAMES_PUBLISHED metric");

    /// Inbound datagrams dropped, labeled by reason
    pub static ref DATAGRAMS_DROPPED: IntCounterVec = register_int_counter_vec!(
        "source_datagrams_dropped_total",
        "Total number of inbound datagrams dropped",
        &["reason"]
    )
    .expect("Failed to create DATAGRAMS_DROPPED metric");

    /// Sources owned by this process
    pub static ref LIVE_SOURCES: IntGauge = register_int_gauge!(
        "source_live",
        "Number of sources owned by this process"
    )
    .expect("Failed to create LIVE_SOURCES metric");
}

#[cfg(feature = "metrics")]
pub fn record_frame_published(source_type: &str) {
    FRAMES_PUBLISHED.with_label_values(&[source_type]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_datagram_dropped(reason: &str) {
    DATAGRAMS_DROPPED.with_label_values(&[reason]).inc();
}

#[cfg(feature = "metrics")]
pub fn set_live_sources(count: usize) {
    LIVE_SOURCES.set(count as i64);
}

// No-op implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub fn record_frame_published(_source_type: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_datagram_dropped(_reason: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn set_live_sources(_count: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_callable() {
        record_frame_published("riot");
        record_datagram_dropped("osc-decode");
        set_live_sources(2);
    }
}

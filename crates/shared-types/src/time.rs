//! Time source port.
//!
//! Abstracted so codecs and sources can be tested with deterministic time.

/// Time source for consistent timestamp handling.
pub trait TimeSource: Send + Sync {
    /// Returns the current time in milliseconds since the UNIX epoch.
    fn now_ms(&self) -> f64;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ms(&self) -> f64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
            * 1000.0
    }
}

/// Fixed time source for tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedTimeSource(pub f64);

impl TimeSource for FixedTimeSource {
    fn now_ms(&self) -> f64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_is_after_2020() {
        assert!(SystemTimeSource.now_ms() > 1_577_836_800_000.0);
    }

    #[test]
    fn test_fixed_time() {
        assert_eq!(FixedTimeSource(42.0).now_ms(), 42.0);
    }
}

//! OSC timetag conversion.
//!
//! Timetags are NTP timestamps: seconds since 1900 plus a 32-bit binary
//! fraction. Frames carry milliseconds since the UNIX epoch, quantised to the
//! microsecond so that a timestamp survives an encode/decode cycle exactly.

use rosc::OscTime;

/// Seconds between 1900-01-01 and 1970-01-01.
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

const FRACTION_SCALE: f64 = 4_294_967_296.0;

/// The special "immediately" timetag.
pub const IMMEDIATE: OscTime = OscTime {
    seconds: 0,
    fractional: 1,
};

pub fn is_immediate(time: &OscTime) -> bool {
    time.seconds == 0 && time.fractional <= 1
}

/// Timetag to whole microseconds since the UNIX epoch.
pub fn timetag_to_micros(time: &OscTime) -> i64 {
    let seconds = i64::from(time.seconds) - NTP_UNIX_OFFSET as i64;
    let fraction_us = (f64::from(time.fractional) / FRACTION_SCALE * 1e6).round() as i64;
    seconds * 1_000_000 + fraction_us
}

/// Milliseconds (any precision) to whole microseconds.
pub fn ms_to_micros(ms: f64) -> i64 {
    (ms * 1000.0).round() as i64
}

pub fn micros_to_ms(micros: i64) -> f64 {
    micros as f64 / 1000.0
}

/// Timetag to milliseconds since the UNIX epoch.
pub fn timetag_to_ms(time: &OscTime) -> f64 {
    micros_to_ms(timetag_to_micros(time))
}

/// Milliseconds since the UNIX epoch to timetag.
pub fn ms_to_timetag(ms: f64) -> OscTime {
    let micros = ms_to_micros(ms);
    let seconds = micros.div_euclid(1_000_000);
    let fraction_us = micros.rem_euclid(1_000_000);
    let fractional = (fraction_us as f64 / 1e6 * FRACTION_SCALE).round();
    OscTime {
        seconds: (seconds + NTP_UNIX_OFFSET as i64).clamp(0, i64::from(u32::MAX)) as u32,
        fractional: fractional.min(f64::from(u32::MAX)) as u32,
    }
}

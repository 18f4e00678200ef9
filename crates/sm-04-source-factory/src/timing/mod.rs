//! Timers owned by sources: liveness watchdogs and the playback scheduler.

pub mod scheduler;
pub mod watchdog;

pub use scheduler::{Engine, Scheduler, DEFAULT_LOOKAHEAD};
pub use watchdog::{ActivityCallback, Watchdog, DEFAULT_TIMEOUT};

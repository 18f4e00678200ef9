//! # Scheduler
//!
//! Runs time engines with a fixed lookahead. An engine is asked to advance
//! to time `t` at `t - lookahead` and answers with the next time it wants,
//! or `None` to leave the scheduler.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Default lookahead absorbing wake-up jitter.
pub const DEFAULT_LOOKAHEAD: Duration = Duration::from_millis(10);

/// Something driven by the scheduler.
pub trait Engine: Send + 'static {
    /// Do the work due at `time`. Returns when to be called next.
    fn advance_time(&mut self, time: Instant) -> Option<Instant>;
}

struct Entry {
    generation: u64,
    task: JoinHandle<()>,
}

type Entries = Arc<Mutex<HashMap<String, Entry>>>;

pub struct Scheduler {
    lookahead: Duration,
    generation: AtomicU64,
    entries: Entries,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_LOOKAHEAD)
    }
}

impl Scheduler {
    pub fn new(lookahead: Duration) -> Self {
        Self {
            lookahead,
            generation: AtomicU64::new(0),
            entries: Entries::default(),
        }
    }

    pub fn lookahead(&self) -> Duration {
        self.lookahead
    }

    /// Schedule `engine` under `key`, first called for `start`.
    ///
    /// Replaces an engine already scheduled under the same key.
    pub fn add(&self, key: &str, mut engine: Box<dyn Engine>, start: Instant) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let lookahead = self.lookahead;
        let entries = self.entries.clone();
        let owned_key = key.to_string();

        // hold the lock so the task cannot finish before it is registered
        let mut guard = self.entries.lock();
        let task = tokio::spawn(async move {
            let mut time = start;
            loop {
                sleep_until(time.checked_sub(lookahead).unwrap_or(time)).await;
                match engine.advance_time(time) {
                    Some(next) => time = next,
                    None => break,
                }
            }
            let mut entries = entries.lock();
            if entries
                .get(&owned_key)
                .is_some_and(|entry| entry.generation == generation)
            {
                entries.remove(&owned_key);
            }
            debug!(key = %owned_key, "[sm-04] Engine left the scheduler");
        });
        if let Some(previous) = guard.insert(key.to_string(), Entry { generation, task }) {
            previous.task.abort();
        }
    }

    /// Stop the engine under `key`. Returns whether one was scheduled.
    pub fn remove(&self, key: &str) -> bool {
        match self.entries.lock().remove(key) {
            Some(entry) => {
                entry.task.abort();
                true
            }
            None => false,
        }
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop every engine.
    pub fn shutdown(&self) {
        for (_, entry) in self.entries.lock().drain() {
            entry.task.abort();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

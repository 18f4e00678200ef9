//! # Watchdog
//!
//! Liveness of a source derived from inbound traffic. Every valid datagram
//! kicks the watchdog; the first kick after silence reports `true`, and
//! `timeout` without a kick reports `false`.
//!
//! Transitions are reported while the state lock is held, so the reported
//! sequence always alternates and ends on the current state.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

/// Default silence after which a source turns inactive.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Receives every activity transition.
pub type ActivityCallback = Arc<dyn Fn(bool) + Send + Sync>;

struct State {
    active: bool,
    last_kick: Instant,
}

struct Shared {
    timeout: Duration,
    state: Mutex<State>,
    wake: Notify,
    on_change: ActivityCallback,
}

pub struct Watchdog {
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl Watchdog {
    pub fn new(timeout: Duration, on_change: ActivityCallback) -> Self {
        let shared = Arc::new(Shared {
            timeout,
            state: Mutex::new(State {
                active: false,
                last_kick: Instant::now(),
            }),
            wake: Notify::new(),
            on_change,
        });
        let task = tokio::spawn(expire_loop(shared.clone()));
        Self { shared, task }
    }

    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    /// Record traffic. Returns whether the source just became active.
    pub fn kick(&self) -> bool {
        let mut state = self.shared.state.lock();
        state.last_kick = Instant::now();
        if state.active {
            return false;
        }
        state.active = true;
        (self.shared.on_change)(true);
        drop(state);
        self.shared.wake.notify_one();
        true
    }

    /// Turn inactive now, e.g. when the upstream of a source disappears.
    pub fn expire(&self) {
        let mut state = self.shared.state.lock();
        if state.active {
            state.active = false;
            (self.shared.on_change)(false);
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }

    /// Stop the timer without reporting a transition.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn expire_loop(shared: Arc<Shared>) {
    loop {
        shared.wake.notified().await;
        loop {
            let deadline = {
                let state = shared.state.lock();
                if !state.active {
                    break;
                }
                state.last_kick + shared.timeout
            };
            sleep_until(deadline).await;

            let mut state = shared.state.lock();
            if state.active && Instant::now() >= state.last_kick + shared.timeout {
                state.active = false;
                (shared.on_change)(false);
                break;
            }
        }
    }
}

//! Pending Call Store - correlates settled envelopes with waiting callers.
//!
//! Flow:
//! 1. `request()` allocates a `CommandId`
//! 2. `register()` hands back a oneshot receiver, before the envelope is written
//! 3. The dispatcher observes the settled envelope and calls `complete()`
//! 4. The caller's future resolves; dropping it early calls `cancel()`

use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::debug;

use super::envelope::CommandId;
use super::errors::RemoteError;

/// Settled outcome delivered to the caller.
#[derive(Debug)]
pub struct RfcResponse {
    pub command_id: CommandId,
    pub ack: Option<Value>,
    pub err: Option<RemoteError>,
    pub response_time: Duration,
}

struct PendingCall {
    sender: oneshot::Sender<RfcResponse>,
    created_at: Instant,
    name: String,
}

/// Statistics for the pending call store
#[derive(Debug, Default)]
pub struct PendingStats {
    /// Total calls registered
    pub total_registered: AtomicU64,
    /// Total calls completed
    pub total_completed: AtomicU64,
    /// Total calls cancelled (caller dropped)
    pub total_cancelled: AtomicU64,
}

/// Outcome of a completion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The waiting caller received the response.
    Delivered,
    /// An entry existed but its caller had gone away.
    CallerGone,
    /// No entry for this command id.
    Unknown,
}

/// Abandoned calls remembered until their late settlement.
pub const MAX_ABANDONED: usize = 1024;

/// Calls awaiting settlement, keyed by command id of the local node.
///
/// Command ids grow monotonically, so once the abandoned set overflows the
/// oldest half is dropped and only the highest forgotten id is kept.
#[derive(Default)]
pub struct PendingCallStore {
    pending: DashMap<CommandId, PendingCall>,
    abandoned: DashMap<CommandId, ()>,
    forgotten_up_to: AtomicU64,
    stats: PendingStats,
}

impl PendingCallStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending call and get a receiver for its response.
    pub fn register(&self, command_id: CommandId, name: &str) -> oneshot::Receiver<RfcResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending.insert(
            command_id,
            PendingCall {
                sender: tx,
                created_at: Instant::now(),
                name: name.to_string(),
            },
        );
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
        debug!(command_id, name, "Registered pending rfc");
        rx
    }

    /// Complete a pending call with its settled outcome.
    pub fn complete(
        &self,
        command_id: CommandId,
        ack: Option<Value>,
        err: Option<RemoteError>,
    ) -> Completion {
        let Some((_, pending)) = self.pending.remove(&command_id) else {
            if self.abandoned.remove(&command_id).is_some()
                || command_id <= self.forgotten_up_to.load(Ordering::Relaxed)
            {
                return Completion::CallerGone;
            }
            return Completion::Unknown;
        };
        let response_time = pending.created_at.elapsed();
        let response = RfcResponse {
            command_id,
            ack,
            err,
            response_time,
        };

        match pending.sender.send(response) {
            Ok(()) => {
                self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
                debug!(
                    command_id,
                    name = pending.name,
                    response_time_ms = response_time.as_millis(),
                    "Completed pending rfc"
                );
                Completion::Delivered
            }
            Err(_) => {
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
                debug!(command_id, name = pending.name, "Pending rfc caller dropped");
                Completion::CallerGone
            }
        }
    }

    /// Cancel a pending call. A late settlement for it is then expected.
    pub fn cancel(&self, command_id: CommandId) -> bool {
        if self.pending.remove(&command_id).is_some() {
            self.abandoned.insert(command_id, ());
            if self.abandoned.len() > MAX_ABANDONED {
                self.forget_oldest_abandoned();
            }
            self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Keep the newest half of the abandoned ids.
    fn forget_oldest_abandoned(&self) -> usize {
        let mut ids: Vec<CommandId> = self.abandoned.iter().map(|entry| *entry.key()).collect();
        if ids.len() <= MAX_ABANDONED / 2 {
            return 0;
        }
        ids.sort_unstable();
        let cutoff = ids[ids.len() - MAX_ABANDONED / 2];
        self.forgotten_up_to.fetch_max(cutoff - 1, Ordering::Relaxed);

        let before = self.abandoned.len();
        self.abandoned.retain(|id, _| *id >= cutoff);
        let forgotten = before.saturating_sub(self.abandoned.len());
        debug!(forgotten, "Forgot oldest abandoned rfcs");
        forgotten
    }

    pub fn abandoned_count(&self) -> usize {
        self.abandoned.len()
    }

    /// Drop every pending call; their callers observe a closed bus.
    pub fn clear(&self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        self.abandoned.clear();
        count
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, command_id: CommandId) -> bool {
        self.pending.contains_key(&command_id)
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_complete() {
        let store = PendingCallStore::new();
        let rx = store.register(1, "ping");
        assert!(store.is_pending(1));
        assert_eq!(store.pending_count(), 1);

        assert_eq!(store.complete(1, Some(json!("pong")), None), Completion::Delivered);

        let response = rx.await.unwrap();
        assert_eq!(response.command_id, 1);
        assert_eq!(response.ack, Some(json!("pong")));
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_complete_unknown_id() {
        let store = PendingCallStore::new();
        assert_eq!(store.complete(99, None, None), Completion::Unknown);
    }

    #[test]
    fn test_complete_after_caller_dropped() {
        let store = PendingCallStore::new();
        drop(store.register(3, "ping"));
        assert_eq!(store.complete(3, None, None), Completion::CallerGone);
        assert_eq!(store.stats().total_cancelled.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_cancel() {
        let store = PendingCallStore::new();
        let _rx = store.register(5, "ping");
        assert!(store.cancel(5));
        assert!(!store.is_pending(5));
        assert!(!store.cancel(5));
        assert_eq!(store.complete(5, None, None), Completion::CallerGone);
        assert_eq!(store.complete(5, None, None), Completion::Unknown);
    }

    #[test]
    fn test_abandoned_calls_are_bounded() {
        let store = PendingCallStore::new();
        let total = MAX_ABANDONED as CommandId + 1;
        for id in 1..=total {
            let _rx = store.register(id, "ping");
            assert!(store.cancel(id));
        }
        assert_eq!(store.abandoned_count(), MAX_ABANDONED / 2);

        // forgotten and remembered ids both settle late, quietly
        assert_eq!(store.complete(1, None, None), Completion::CallerGone);
        assert_eq!(store.complete(total, None, None), Completion::CallerGone);
        assert_eq!(store.abandoned_count(), MAX_ABANDONED / 2 - 1);
        assert_eq!(store.complete(total + 1, None, None), Completion::Unknown);

        store.clear();
        assert_eq!(store.abandoned_count(), 0);
    }

    #[test]
    fn test_stats() {
        let store = PendingCallStore::new();
        let _rx1 = store.register(1, "a");
        let _rx2 = store.register(2, "b");
        assert_eq!(store.stats().total_registered.load(Ordering::Relaxed), 2);

        store.complete(1, None, None);
        assert_eq!(store.stats().total_completed.load(Ordering::Relaxed), 1);

        store.cancel(2);
        assert_eq!(store.stats().total_cancelled.load(Ordering::Relaxed), 1);
    }
}

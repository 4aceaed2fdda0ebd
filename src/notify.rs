//! Change notifications
//!
//! A bounded queue of variable names from the producer to a consumer loop.
//! The producer never waits: when the queue is full the name is dropped.
//! Notifications are a hint only, the store stays the source of truth.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::time::Duration;

/// Create a notification queue holding at most `capacity` names
///
/// A zero capacity is raised to one.
pub fn change_channel(capacity: usize) -> (Notifier, ChangeFeed) {
    let (tx, rx) = mpsc::sync_channel(capacity.max(1));
    (
        Notifier {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        },
        ChangeFeed { rx },
    )
}

/// Sending side, owned by the producer
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: SyncSender<String>,
    dropped: Arc<AtomicU64>,
}

impl Notifier {
    /// Queue `name` if there is room
    ///
    /// Returns false if the name was dropped, either because the queue is
    /// full or because the consumer is gone.
    pub fn notify(&self, name: &str) -> bool {
        match self.tx.try_send(name.to_string()) {
            Ok(()) => true,
            Err(TrySendError::Full(name)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(name = %name, "change queue full, notification dropped");
                false
            },
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Notifications dropped on a full queue so far
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Receiving side, owned by a consumer loop
///
/// Iterating blocks until a name arrives and ends once every [`Notifier`]
/// has been dropped.
#[derive(Debug)]
pub struct ChangeFeed {
    rx: Receiver<String>,
}

impl ChangeFeed {
    /// Next name without waiting
    pub fn try_next(&self) -> Option<String> {
        match self.rx.try_recv() {
            Ok(name) => Some(name),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Next name, waiting at most `timeout`
    pub fn next_timeout(&self, timeout: Duration) -> Option<String> {
        match self.rx.recv_timeout(timeout) {
            Ok(name) => Some(name),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything queued right now
    pub fn drain(&self) -> Vec<String> {
        self.rx.try_iter().collect()
    }
}

impl Iterator for ChangeFeed {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.rx.recv().ok()
    }
}

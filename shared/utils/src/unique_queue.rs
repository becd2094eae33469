//! Bounded work queue that collapses duplicate pushes for the same key.

use std::collections::HashSet;

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A value tagged with the dedup key it is queued under (normally the
/// document id it concerns).
#[derive(Debug, Clone)]
pub struct QueueItem<T> {
    pub key: String,
    pub value: T,
}

/// Capacity-bounded queue holding at most one in-flight item per key.
///
/// A push for a key that is already pending returns immediately without
/// replacing the queued value, so rapid-fire edits to one document collapse
/// to a single unit of work. A push for a new key suspends when the buffer
/// is full until a consumer pops.
///
/// The membership set has its own lock, held only for the check and update,
/// never across a channel operation.
pub struct UniqueQueue<T> {
    tx: mpsc::Sender<QueueItem<T>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<QueueItem<T>>>,
    pending: Mutex<HashSet<String>>,
}

impl<T> UniqueQueue<T> {
    pub fn new(max_len: usize) -> Self {
        // tokio channels need a capacity of at least one
        let (tx, rx) = mpsc::channel(max_len.max(1));
        Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// Enqueue `item` unless its key is already pending. Suspends when the
    /// buffer is at capacity.
    pub async fn push(&self, item: QueueItem<T>) {
        {
            let mut pending = self.pending.lock();
            if pending.contains(&item.key) {
                return;
            }
            pending.insert(item.key.clone());
        }

        let key = item.key.clone();
        if self.tx.send(item).await.is_err() {
            // Receiver gone, nothing will ever drain this key.
            self.pending.lock().remove(&key);
            tracing::warn!("dropping queued change for {}, queue is closed", key);
        }
    }

    /// Wait for the next item and release its key for future pushes.
    /// Returns `None` only once the queue is closed.
    pub async fn pop(&self) -> Option<T> {
        let item = self.rx.lock().await.recv().await?;
        self.pending.lock().remove(&item.key);
        Some(item.value)
    }

    /// Number of keys currently pending (pushed but not yet popped).
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

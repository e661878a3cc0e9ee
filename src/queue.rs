use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::sbs::SbsMessage;

/// Unbounded FIFO between the ingestion task and the window aggregator.
/// Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct MessageQueue {
    inner: Arc<Mutex<VecDeque<SbsMessage>>>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, msg: SbsMessage) {
        self.inner.lock().await.push_back(msg);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Removes and returns at most `limit` messages, oldest first.
    ///
    /// The aggregator snapshots `len` at the window boundary and passes it
    /// here, so records arriving while a window is being processed wait
    /// for the next one.
    pub async fn drain_up_to(&self, limit: usize) -> Vec<SbsMessage> {
        let mut queue = self.inner.lock().await;
        let take = limit.min(queue.len());
        queue.drain(..take).collect()
    }
}

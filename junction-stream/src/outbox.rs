//! Client-owned FIFO of frames waiting to be written.

use crate::frame::ClientFrame;
use junction_dispatch::ResultSink;
use junction_types::OutboundResult;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// Outbound frame queue shared by the dispatcher, the reader, and the
/// per-connection writer.
///
/// The queue outlives connections. The writer only removes a frame after
/// it was written, so a frame cut off by a failing connection is the first
/// one written on the next.
#[derive(Clone, Default)]
pub struct Outbox {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    queue: Mutex<VecDeque<ClientFrame>>,
    ready: Notify,
}

impl Outbox {
    /// Create an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame.
    pub fn push(&self, frame: ClientFrame) {
        self.lock().push_back(frame);
        self.inner.ready.notify_one();
    }

    /// Number of frames not yet written.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when every frame was written.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the oldest frame, if any.
    pub(crate) fn front(&self) -> Option<ClientFrame> {
        self.lock().front().cloned()
    }

    /// Remove the oldest frame after it was written.
    pub(crate) fn confirm(&self) {
        self.lock().pop_front();
    }

    /// Wait until a frame may have been pushed.
    pub(crate) async fn changed(&self) {
        self.inner.ready.notified().await;
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ClientFrame>> {
        self.inner.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultSink for Outbox {
    fn deliver(&self, result: OutboundResult) {
        self.push(ClientFrame::Result(result));
    }
}

impl std::fmt::Debug for Outbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Outbox").field("queued", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ack(id: i64) -> ClientFrame {
        ClientFrame::KeepAliveAck { id: id.into() }
    }

    #[test]
    fn front_is_kept_until_confirmed() {
        let outbox = Outbox::new();
        outbox.push(ack(1));
        outbox.push(ack(2));
        assert_eq!(outbox.front(), Some(ack(1)));
        assert_eq!(outbox.front(), Some(ack(1)));
        outbox.confirm();
        assert_eq!(outbox.front(), Some(ack(2)));
        outbox.confirm();
        assert!(outbox.is_empty());
    }

    #[tokio::test]
    async fn push_wakes_a_waiting_writer() {
        let outbox = Outbox::new();
        let waiter = {
            let outbox = outbox.clone();
            tokio::spawn(async move {
                outbox.changed().await;
                outbox.front()
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        outbox.push(ack(7));
        assert_eq!(waiter.await.unwrap(), Some(ack(7)));
    }

    #[tokio::test]
    async fn push_before_wait_is_not_missed() {
        let outbox = Outbox::new();
        outbox.push(ack(1));
        tokio::time::timeout(Duration::from_millis(100), outbox.changed())
            .await
            .unwrap();
    }
}

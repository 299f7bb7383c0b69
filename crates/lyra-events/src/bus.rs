use tokio::sync::broadcast;

use crate::BufferEvent;

/// Broadcast channel mirroring the scheduler's events.
///
/// `publish()` never blocks and never fails: without subscribers the event is
/// dropped, and a slow subscriber gets `RecvError::Lagged(n)` instead of
/// holding the producer back.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<BufferEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish<E: Into<BufferEvent>>(&self, event: E) {
        let _ = self.tx.send(event.into());
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<BufferEvent> {
        self.tx.subscribe()
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

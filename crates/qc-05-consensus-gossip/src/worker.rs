//! # Broadcast Queue and Worker
//!
//! Decouples ingestion latency from O(peers) fan-out cost.
//!
//! ```text
//! [Admission] ──try_send──→ [bounded queue (256)] ──recv──→ [Worker loop]
//!                                                              │ spawn per message
//!                                                              ↓
//!                                                        [GossipRelay::broadcast]
//! ```
//!
//! Enqueue never blocks: a full queue drops the message with a warning.
//! Broadcast is best-effort and must not push back on ingestion.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::domain::ConsensusMessage;
use crate::metrics::GossipMetrics;
use crate::ports::outbound::PeerBroadcaster;
use crate::relay::GossipRelay;

/// Producer half of the broadcast queue.
#[derive(Clone)]
pub struct BroadcastQueue {
    sender: mpsc::Sender<ConsensusMessage>,
    metrics: Arc<GossipMetrics>,
}

impl BroadcastQueue {
    /// Create a bounded queue, returning the producer and the receiver the
    /// worker drains.
    pub fn new(
        capacity: usize,
        metrics: Arc<GossipMetrics>,
    ) -> (Self, mpsc::Receiver<ConsensusMessage>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender, metrics }, receiver)
    }

    /// Queue a message for fan-out without blocking.
    ///
    /// Returns `false` if the message was dropped.
    pub fn enqueue(&self, message: ConsensusMessage) -> bool {
        match self.sender.try_send(message) {
            Ok(()) => {
                self.metrics.record_enqueued();
                true
            }
            Err(mpsc::error::TrySendError::Full(message)) => {
                self.metrics.record_queue_dropped();
                warn!(
                    kind = %message.kind(),
                    hash = %hex::encode(message.hash()),
                    "Broadcast queue full, dropping message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                self.metrics.record_queue_dropped();
                debug!(
                    kind = %message.kind(),
                    "Broadcast worker stopped, dropping message"
                );
                false
            }
        }
    }

    /// Free slots remaining in the queue.
    pub fn remaining_capacity(&self) -> usize {
        self.sender.capacity()
    }
}

/// Single long-lived task draining the broadcast queue.
pub struct BroadcastWorker<N: PeerBroadcaster> {
    receiver: mpsc::Receiver<ConsensusMessage>,
    relay: Arc<GossipRelay<N>>,
}

impl<N> BroadcastWorker<N>
where
    N: PeerBroadcaster + 'static,
{
    pub fn new(receiver: mpsc::Receiver<ConsensusMessage>, relay: Arc<GossipRelay<N>>) -> Self {
        Self { receiver, relay }
    }

    /// Run until `shutdown` fires or every producer is dropped.
    ///
    /// Each dequeued message is fanned out on its own task. In-flight fan-outs
    /// are not awaited on exit.
    pub async fn run(mut self, mut shutdown: oneshot::Receiver<()>) {
        info!("Consensus broadcast worker started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Received shutdown signal");
                    break;
                }
                next = self.receiver.recv() => {
                    match next {
                        Some(message) => {
                            let relay = Arc::clone(&self.relay);
                            tokio::spawn(async move {
                                relay.broadcast(message).await;
                            });
                        }
                        None => {
                            info!("Broadcast queue closed, exiting");
                            break;
                        }
                    }
                }
            }
        }

        info!("Consensus broadcast worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Timeout;

    fn timeout(round: u64) -> ConsensusMessage {
        ConsensusMessage::Timeout(Timeout::new(round, vec![], 0))
    }

    #[test]
    fn test_enqueue_drops_when_full() {
        let metrics = Arc::new(GossipMetrics::default());
        let (queue, _rx) = BroadcastQueue::new(2, Arc::clone(&metrics));

        assert!(queue.enqueue(timeout(1)));
        assert!(queue.enqueue(timeout(2)));
        assert_eq!(queue.remaining_capacity(), 0);
        assert!(!queue.enqueue(timeout(3)));

        let snap = metrics.snapshot();
        assert_eq!(snap.enqueued, 2);
        assert_eq!(snap.queue_dropped, 1);
    }

    #[test]
    fn test_enqueue_after_receiver_dropped() {
        let metrics = Arc::new(GossipMetrics::default());
        let (queue, rx) = BroadcastQueue::new(4, Arc::clone(&metrics));
        drop(rx);

        assert!(!queue.enqueue(timeout(1)));
        assert_eq!(metrics.snapshot().queue_dropped, 1);
    }

    #[test]
    fn test_queue_is_fifo() {
        let metrics = Arc::new(GossipMetrics::default());
        let (queue, mut rx) = BroadcastQueue::new(4, metrics);

        queue.enqueue(timeout(1));
        queue.enqueue(timeout(2));

        assert_eq!(rx.try_recv().ok(), Some(timeout(1)));
        assert_eq!(rx.try_recv().ok(), Some(timeout(2)));
    }
}

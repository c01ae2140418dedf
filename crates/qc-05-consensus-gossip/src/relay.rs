//! # Gossip Relay
//!
//! Re-broadcasts verified consensus messages to every connected peer that is
//! not already known to have them.
//!
//! A peer "knows" a hash once it has sent it to us or we have sent it to the
//! peer. Knowledge is tracked per peer and per message kind in bounded
//! [`KnownHashSet`]s. Trackers are created on connect (or on first contact
//! while the peer is connected) and destroyed on disconnect; no other
//! component mutates them.

use parking_lot::{Mutex, RwLock};
use shared_types::Hash;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::domain::{ConsensusMessage, KnownHashSet, MessageKind, PeerId};
use crate::metrics::GossipMetrics;
use crate::ports::outbound::PeerBroadcaster;

/// What a peer is known to have, one set per message kind.
pub struct PeerKnowledge {
    sets: [Mutex<KnownHashSet>; 3],
}

impl PeerKnowledge {
    pub fn new(capacity: usize) -> Self {
        Self {
            sets: [
                Mutex::new(KnownHashSet::new(capacity)),
                Mutex::new(KnownHashSet::new(capacity)),
                Mutex::new(KnownHashSet::new(capacity)),
            ],
        }
    }

    pub fn knows(&self, kind: MessageKind, hash: &Hash) -> bool {
        self.sets[kind.index()].lock().contains(hash)
    }

    /// Record the hash. Returns `false` if the peer already knew it.
    pub fn mark(&self, kind: MessageKind, hash: Hash) -> bool {
        self.sets[kind.index()].lock().mark(hash)
    }

    pub fn known_count(&self, kind: MessageKind) -> usize {
        self.sets[kind.index()].lock().len()
    }
}

/// Per-peer knowledge trackers.
pub struct PeerKnowledgeTracker {
    peers: RwLock<HashMap<PeerId, Arc<PeerKnowledge>>>,
    capacity: usize,
}

impl PeerKnowledgeTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Tracker for `peer`, created on first contact.
    pub fn get_or_create(&self, peer: PeerId) -> Arc<PeerKnowledge> {
        if let Some(knowledge) = self.peers.read().get(&peer) {
            return Arc::clone(knowledge);
        }
        let mut peers = self.peers.write();
        Arc::clone(
            peers
                .entry(peer)
                .or_insert_with(|| Arc::new(PeerKnowledge::new(self.capacity))),
        )
    }

    pub fn get(&self, peer: &PeerId) -> Option<Arc<PeerKnowledge>> {
        self.peers.read().get(peer).cloned()
    }

    /// Destroy the tracker for a disconnected peer.
    pub fn remove(&self, peer: &PeerId) -> bool {
        self.peers.write().remove(peer).is_some()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }
}

/// Per-message fan-out summary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FanoutReport {
    /// Peers the message was sent to.
    pub sent: usize,
    /// Peers skipped because they already knew the hash.
    pub skipped: usize,
    /// Peers whose send failed.
    pub failed: usize,
}

/// Fans verified messages out to connected peers.
pub struct GossipRelay<N: PeerBroadcaster> {
    network: Arc<N>,
    tracker: PeerKnowledgeTracker,
    metrics: Arc<GossipMetrics>,
}

impl<N: PeerBroadcaster> GossipRelay<N> {
    pub fn new(network: Arc<N>, known_set_capacity: usize, metrics: Arc<GossipMetrics>) -> Self {
        Self {
            network,
            tracker: PeerKnowledgeTracker::new(known_set_capacity),
            metrics,
        }
    }

    /// Record that `peer` has `hash`, typically because it sent it to us.
    ///
    /// Peers without an open session are ignored, so a late message from a
    /// disconnected peer cannot bring its tracker back.
    pub fn mark_known(&self, peer: PeerId, kind: MessageKind, hash: Hash) {
        if let Some(knowledge) = self.knowledge_for(peer) {
            knowledge.mark(kind, hash);
        }
    }

    /// Existing tracker for `peer`, or a new one if the peer is connected.
    fn knowledge_for(&self, peer: PeerId) -> Option<Arc<PeerKnowledge>> {
        if let Some(knowledge) = self.tracker.get(&peer) {
            return Some(knowledge);
        }
        if self.network.is_connected(&peer) {
            return Some(self.tracker.get_or_create(peer));
        }
        trace!(peer = %peer.short(), "Ignoring knowledge for disconnected peer");
        None
    }

    /// Whether `peer` is known to have `hash`.
    pub fn peer_knows(&self, peer: &PeerId, kind: MessageKind, hash: &Hash) -> bool {
        self.tracker
            .get(peer)
            .map(|k| k.knows(kind, hash))
            .unwrap_or(false)
    }

    pub fn peer_connected(&self, peer: PeerId) {
        self.tracker.get_or_create(peer);
        debug!(peer = %peer.short(), "Peer tracker created");
    }

    pub fn peer_disconnected(&self, peer: &PeerId) {
        if self.tracker.remove(peer) {
            debug!(peer = %peer.short(), "Peer tracker destroyed");
        }
    }

    pub fn tracked_peers(&self) -> usize {
        self.tracker.peer_count()
    }

    /// Send `message` to every connected peer that does not already know it.
    ///
    /// The peer set is snapshotted once. A send failure is logged and the
    /// fan-out continues with the remaining peers.
    pub async fn broadcast(&self, message: ConsensusMessage) -> FanoutReport {
        let kind = message.kind();
        let hash = message.hash();
        let peers = self.network.connected_peers();
        let mut report = FanoutReport::default();

        for peer in peers {
            // Disconnected since the snapshot
            let Some(knowledge) = self.knowledge_for(peer) else {
                continue;
            };
            if !knowledge.mark(kind, hash) {
                report.skipped += 1;
                self.metrics.record_skipped();
                trace!(peer = %peer.short(), %kind, "Peer already knows message, skipping");
                continue;
            }

            let result = match &message {
                ConsensusMessage::Vote(vote) => self.network.send_vote(peer, vote).await,
                ConsensusMessage::Timeout(timeout) => {
                    self.network.send_timeout(peer, timeout).await
                }
                ConsensusMessage::SyncInfo(sync_info) => {
                    self.network.send_sync_info(peer, sync_info).await
                }
            };

            match result {
                Ok(()) => {
                    report.sent += 1;
                    self.metrics.record_sent();
                }
                Err(e) => {
                    report.failed += 1;
                    self.metrics.record_send_failed();
                    warn!(peer = %peer.short(), %kind, error = %e, "Failed to relay consensus message");
                }
            }
        }

        debug!(
            %kind,
            hash = %hex::encode(hash),
            sent = report.sent,
            skipped = report.skipped,
            failed = report.failed,
            "Consensus message relayed"
        );
        report
    }
}

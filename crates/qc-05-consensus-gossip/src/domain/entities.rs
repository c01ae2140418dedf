//! # Core Domain Entities
//!
//! ## Entities
//!
//! - [`MessageKind`]: The three consensus message kinds the layer relays
//! - [`ConsensusMessage`]: Tagged variant carried by the broadcast queue
//! - [`PeerId`]: 32-byte peer identifier for P2P communication

use shared_types::{Hash, SyncInfo, Timeout, Vote};
use std::fmt;

/// Kind of consensus message.
///
/// Each kind has its own dedup cache and its own per-peer known set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Vote,
    Timeout,
    SyncInfo,
}

impl MessageKind {
    /// All kinds, in a fixed order.
    pub const ALL: [MessageKind; 3] = [MessageKind::Vote, MessageKind::Timeout, MessageKind::SyncInfo];

    /// Short label for logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Vote => "vote",
            MessageKind::Timeout => "timeout",
            MessageKind::SyncInfo => "sync_info",
        }
    }

    pub(crate) fn index(&self) -> usize {
        match self {
            MessageKind::Vote => 0,
            MessageKind::Timeout => 1,
            MessageKind::SyncInfo => 2,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A verified consensus message waiting to be relayed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsensusMessage {
    Vote(Vote),
    Timeout(Timeout),
    SyncInfo(SyncInfo),
}

impl ConsensusMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            ConsensusMessage::Vote(_) => MessageKind::Vote,
            ConsensusMessage::Timeout(_) => MessageKind::Timeout,
            ConsensusMessage::SyncInfo(_) => MessageKind::SyncInfo,
        }
    }

    /// Content hash of the wrapped message.
    pub fn hash(&self) -> Hash {
        match self {
            ConsensusMessage::Vote(v) => v.hash(),
            ConsensusMessage::Timeout(t) => t.hash(),
            ConsensusMessage::SyncInfo(s) => s.hash(),
        }
    }

    /// Chain height the wrapped message is measured against.
    pub fn reference_height(&self) -> u64 {
        match self {
            ConsensusMessage::Vote(v) => v.reference_height(),
            ConsensusMessage::Timeout(t) => t.reference_height(),
            ConsensusMessage::SyncInfo(s) => s.reference_height(),
        }
    }
}

impl From<Vote> for ConsensusMessage {
    fn from(vote: Vote) -> Self {
        ConsensusMessage::Vote(vote)
    }
}

impl From<Timeout> for ConsensusMessage {
    fn from(timeout: Timeout) -> Self {
        ConsensusMessage::Timeout(timeout)
    }
}

impl From<SyncInfo> for ConsensusMessage {
    fn from(sync_info: SyncInfo) -> Self {
        ConsensusMessage::SyncInfo(sync_info)
    }
}

/// Peer identifier for P2P network communication.
///
/// # Example
///
/// ```rust
/// use qc_05_consensus_gossip::PeerId;
///
/// let peer = PeerId::new([0xAB; 32]);
/// let peer_from_bytes = PeerId::from_bytes(&[0xAB; 32]).unwrap();
/// assert_eq!(peer, peer_from_bytes);
/// assert_eq!(peer.short(), "abababab");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PeerId(pub [u8; 32]);

impl PeerId {
    pub fn new(id: [u8; 32]) -> Self {
        Self(id)
    }

    /// Creates a peer ID from a byte slice.
    ///
    /// Returns `None` if the slice is shorter than 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 32 {
            let mut id = [0u8; 32];
            id.copy_from_slice(&bytes[..32]);
            Some(Self(id))
        } else {
            None
        }
    }

    /// First four bytes in hex, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

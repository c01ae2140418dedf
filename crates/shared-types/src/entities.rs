//! # Consensus Message Entities
//!
//! Wire-level entities exchanged between BFT participants.
//!
//! ## Clusters
//!
//! - **References**: `BlockInfo`, `QuorumCert`, `TimeoutCert`
//! - **Gossip messages**: `Vote`, `Timeout`, `SyncInfo`
//!
//! Every gossip message has a content hash that serves as its identity for
//! deduplication and per-peer gossip suppression. The hash covers every
//! field, signatures included.

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// A 32-byte hash (Keccak-256).
pub type Hash = [u8; 32];

/// An opaque signature. Its scheme is owned by the consensus engine.
pub type Signature = Vec<u8>;

/// Reference to a proposed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BlockInfo {
    /// Hash of the proposed block.
    pub hash: Hash,
    /// Consensus round the block was proposed in.
    pub round: u64,
    /// Chain height of the block.
    pub number: u64,
}

impl BlockInfo {
    pub fn new(hash: Hash, round: u64, number: u64) -> Self {
        Self {
            hash,
            round,
            number,
        }
    }

    fn feed(&self, hasher: &mut Keccak256) {
        hasher.update(self.hash);
        hasher.update(self.round.to_be_bytes());
        hasher.update(self.number.to_be_bytes());
    }
}

/// Aggregate evidence that a supermajority voted for a proposed block.
///
/// Opaque to the gossip layer beyond its embedded block reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QuorumCert {
    /// The block the quorum voted for.
    pub proposed_block_info: BlockInfo,
    /// Individual participant signatures.
    pub signatures: Vec<Signature>,
    /// Reference height for epoch gap computations.
    pub gap_number: u64,
}

impl QuorumCert {
    fn feed(&self, hasher: &mut Keccak256) {
        self.proposed_block_info.feed(hasher);
        feed_signatures(hasher, &self.signatures);
        hasher.update(self.gap_number.to_be_bytes());
    }
}

/// Aggregate evidence that a supermajority timed out in a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TimeoutCert {
    pub round: u64,
    pub signatures: Vec<Signature>,
    pub gap_number: u64,
}

impl TimeoutCert {
    fn feed(&self, hasher: &mut Keccak256) {
        hasher.update(self.round.to_be_bytes());
        feed_signatures(hasher, &self.signatures);
        hasher.update(self.gap_number.to_be_bytes());
    }
}

/// A participant's signed endorsement of a proposed block.
///
/// # Example
///
/// ```rust
/// use shared_types::{BlockInfo, Vote};
///
/// let vote = Vote::new(BlockInfo::new([0xAB; 32], 4, 1005), vec![1, 2, 3], 450);
/// assert_eq!(vote.reference_height(), 1005);
/// assert_eq!(vote.hash(), vote.clone().hash());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Vote {
    /// The block being endorsed.
    pub proposed_block_info: BlockInfo,
    /// Signature over the block info and gap number.
    pub signature: Signature,
    /// Reference height for epoch gap computations.
    pub gap_number: u64,
}

impl Vote {
    pub fn new(proposed_block_info: BlockInfo, signature: Signature, gap_number: u64) -> Self {
        Self {
            proposed_block_info,
            signature,
            gap_number,
        }
    }

    /// Content hash used as the vote's identity.
    pub fn hash(&self) -> Hash {
        let mut hasher = Keccak256::new();
        hasher.update(b"vote");
        self.proposed_block_info.feed(&mut hasher);
        feed_bytes(&mut hasher, &self.signature);
        hasher.update(self.gap_number.to_be_bytes());
        hasher.finalize().into()
    }

    /// Chain height the vote refers to.
    pub fn reference_height(&self) -> u64 {
        self.proposed_block_info.number
    }
}

/// A participant's signed assertion that the current round expired.
///
/// Round numbers do not map monotonically to chain height, so the relevance
/// of a timeout is measured against its `gap_number` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Timeout {
    pub round: u64,
    pub signature: Signature,
    pub gap_number: u64,
}

impl Timeout {
    pub fn new(round: u64, signature: Signature, gap_number: u64) -> Self {
        Self {
            round,
            signature,
            gap_number,
        }
    }

    /// Content hash used as the timeout's identity.
    pub fn hash(&self) -> Hash {
        let mut hasher = Keccak256::new();
        hasher.update(b"timeout");
        hasher.update(self.round.to_be_bytes());
        feed_bytes(&mut hasher, &self.signature);
        hasher.update(self.gap_number.to_be_bytes());
        hasher.finalize().into()
    }

    /// Chain height the timeout is anchored to.
    pub fn reference_height(&self) -> u64 {
        self.gap_number
    }
}

/// Highest certificates known to the sender, used to catch up stragglers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SyncInfo {
    pub highest_quorum_cert: QuorumCert,
    pub highest_timeout_cert: Option<TimeoutCert>,
}

impl SyncInfo {
    pub fn new(highest_quorum_cert: QuorumCert, highest_timeout_cert: Option<TimeoutCert>) -> Self {
        Self {
            highest_quorum_cert,
            highest_timeout_cert,
        }
    }

    /// Content hash used as the sync-info's identity.
    pub fn hash(&self) -> Hash {
        let mut hasher = Keccak256::new();
        hasher.update(b"syncinfo");
        self.highest_quorum_cert.feed(&mut hasher);
        match &self.highest_timeout_cert {
            Some(tc) => {
                hasher.update([1u8]);
                tc.feed(&mut hasher);
            }
            None => hasher.update([0u8]),
        }
        hasher.finalize().into()
    }

    /// Chain height of the block certified by the highest QC.
    pub fn reference_height(&self) -> u64 {
        self.highest_quorum_cert.proposed_block_info.number
    }
}

// Length prefixes keep adjacent variable-length fields unambiguous.
fn feed_bytes(hasher: &mut Keccak256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn feed_signatures(hasher: &mut Keccak256, signatures: &[Signature]) {
    hasher.update((signatures.len() as u64).to_be_bytes());
    for sig in signatures {
        feed_bytes(hasher, sig);
    }
}

//! # Error Types
//!
//! Errors raised by the consensus engine while verifying or integrating
//! gossip messages. The gossip layer passes these through to the peer
//! protocol layer untouched; it never inspects or rewrites them.

use thiserror::Error;

/// Failures reported by injected verify/handle functions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    /// Message could not be decoded into a meaningful consensus object.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Signature does not verify against the claimed signer.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Signer is not a member of the participant set for the epoch.
    #[error("Unknown signer at gap number {gap_number}")]
    UnknownSigner { gap_number: u64 },

    /// Referenced block is unknown to the local chain.
    #[error("Unknown block: {0:?}")]
    UnknownBlock(crate::Hash),

    /// Engine-side failure while integrating an already-verified message.
    #[error("Engine error: {0}")]
    Engine(String),
}

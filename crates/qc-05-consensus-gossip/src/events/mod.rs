//! Error types for the consensus gossip subsystem.
//!
//! Verification and handling failures are [`shared_types::ConsensusError`]s and
//! cross the subsystem boundary unchanged. The errors here stay local: peer send
//! failures are only logged, and lifecycle misuse is reported to the caller
//! wiring the subsystem.

use thiserror::Error;

use crate::domain::{LifecycleState, PeerId};

/// Consensus gossip errors.
#[derive(Debug, Error)]
pub enum GossipError {
    #[error("Send to peer {peer} failed: {reason}")]
    SendFailed { peer: PeerId, reason: String },

    #[error("Peer disconnected: {0}")]
    PeerDisconnected(PeerId),

    #[error("Consensus functions already configured")]
    AlreadyConfigured,

    #[error("Invalid lifecycle transition: cannot {action} while {state:?}")]
    InvalidState {
        action: &'static str,
        state: LifecycleState,
    },

    #[error("No Tokio runtime available to spawn the broadcast worker")]
    NoRuntime,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    ZeroCapacity { field: &'static str },

    #[error("default_epoch_length must be greater than zero")]
    ZeroEpochLength,
}

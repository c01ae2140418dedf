//! Inbound ports (API) for the consensus gossip subsystem.

use shared_types::{ConsensusError, SyncInfo, Timeout, Vote};

use crate::domain::PeerId;

/// Entry points used by the peer protocol layer.
///
/// Only verification and handling failures are returned. Duplicates, stale
/// messages and broadcast failures are local decisions and yield `Ok(())`.
/// The caller decides whether an error warrants penalizing `peer`.
pub trait ConsensusMessageReceiver: Send + Sync {
    /// Handle a vote received from `peer`.
    fn handle_vote(&self, peer: PeerId, vote: Vote) -> Result<(), ConsensusError>;

    /// Handle a timeout received from `peer`.
    fn handle_timeout(&self, peer: PeerId, timeout: Timeout) -> Result<(), ConsensusError>;

    /// Handle a sync-info received from `peer`.
    fn handle_sync_info(&self, peer: PeerId, sync_info: SyncInfo) -> Result<(), ConsensusError>;

    /// A peer session was established.
    fn peer_connected(&self, peer: PeerId);

    /// A peer session ended; its gossip knowledge is discarded.
    fn peer_disconnected(&self, peer: PeerId);
}

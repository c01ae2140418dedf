//! Outbound ports (SPI) for the consensus gossip subsystem.

use async_trait::async_trait;
use shared_types::{ConsensusError, Hash, SyncInfo, Timeout, Vote};
use std::fmt;
use std::sync::Arc;

use crate::domain::PeerId;
use crate::events::GossipError;

/// Read-only view of the local chain.
///
/// Supplied by the blockchain component. The gossip layer only reads the head
/// height; the whole view is handed to verify/handle functions.
pub trait ChainReader: Send + Sync {
    /// Height of the current chain head.
    fn current_height(&self) -> u64;

    /// Hash of the canonical block at `number`, if known.
    fn block_hash(&self, number: u64) -> Option<Hash>;
}

/// Peer network interface used for fan-out.
///
/// A send failure is reported back to the relay, which logs it. It never
/// becomes a protocol error.
#[async_trait]
pub trait PeerBroadcaster: Send + Sync {
    /// Snapshot of currently connected peers.
    fn connected_peers(&self) -> Vec<PeerId>;

    /// Whether `peer` currently has an open session.
    fn is_connected(&self, peer: &PeerId) -> bool {
        self.connected_peers().contains(peer)
    }

    async fn send_vote(&self, peer: PeerId, vote: &Vote) -> Result<(), GossipError>;

    async fn send_timeout(&self, peer: PeerId, timeout: &Timeout) -> Result<(), GossipError>;

    async fn send_sync_info(&self, peer: PeerId, sync_info: &SyncInfo) -> Result<(), GossipError>;
}

/// Verification function injected by the consensus engine.
///
/// `Ok(false)` means well-formed but currently unacceptable (silent drop);
/// `Err` means malformed or cryptographically invalid.
pub type VerifyFn<M> =
    Arc<dyn Fn(&dyn ChainReader, &M) -> Result<bool, ConsensusError> + Send + Sync>;

/// Handling function injected by the consensus engine.
pub type HandleFn<M> = Arc<dyn Fn(&dyn ChainReader, &M) -> Result<(), ConsensusError> + Send + Sync>;

/// Late-bound consensus engine callbacks, one (verify, handle) pair per kind.
///
/// # Example
///
/// ```rust
/// use qc_05_consensus_gossip::ConsensusHooks;
///
/// let hooks = ConsensusHooks::default()
///     .with_vote(|_, _| Ok(true), |_, _| Ok(()))
///     .with_timeout(|_, _| Ok(true), |_, _| Ok(()));
/// assert!(hooks.verify_vote.is_some());
/// assert!(hooks.verify_sync_info.is_none());
/// ```
#[derive(Clone, Default)]
pub struct ConsensusHooks {
    pub verify_vote: Option<VerifyFn<Vote>>,
    pub handle_vote: Option<HandleFn<Vote>>,
    pub verify_timeout: Option<VerifyFn<Timeout>>,
    pub handle_timeout: Option<HandleFn<Timeout>>,
    pub verify_sync_info: Option<VerifyFn<SyncInfo>>,
    pub handle_sync_info: Option<HandleFn<SyncInfo>>,
}

impl ConsensusHooks {
    pub fn with_vote<V, H>(mut self, verify: V, handle: H) -> Self
    where
        V: Fn(&dyn ChainReader, &Vote) -> Result<bool, ConsensusError> + Send + Sync + 'static,
        H: Fn(&dyn ChainReader, &Vote) -> Result<(), ConsensusError> + Send + Sync + 'static,
    {
        self.verify_vote = Some(Arc::new(verify));
        self.handle_vote = Some(Arc::new(handle));
        self
    }

    pub fn with_timeout<V, H>(mut self, verify: V, handle: H) -> Self
    where
        V: Fn(&dyn ChainReader, &Timeout) -> Result<bool, ConsensusError> + Send + Sync + 'static,
        H: Fn(&dyn ChainReader, &Timeout) -> Result<(), ConsensusError> + Send + Sync + 'static,
    {
        self.verify_timeout = Some(Arc::new(verify));
        self.handle_timeout = Some(Arc::new(handle));
        self
    }

    pub fn with_sync_info<V, H>(mut self, verify: V, handle: H) -> Self
    where
        V: Fn(&dyn ChainReader, &SyncInfo) -> Result<bool, ConsensusError> + Send + Sync + 'static,
        H: Fn(&dyn ChainReader, &SyncInfo) -> Result<(), ConsensusError> + Send + Sync + 'static,
    {
        self.verify_sync_info = Some(Arc::new(verify));
        self.handle_sync_info = Some(Arc::new(handle));
        self
    }
}

impl fmt::Debug for ConsensusHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsensusHooks")
            .field("verify_vote", &self.verify_vote.is_some())
            .field("handle_vote", &self.handle_vote.is_some())
            .field("verify_timeout", &self.verify_timeout.is_some())
            .field("handle_timeout", &self.handle_timeout.is_some())
            .field("verify_sync_info", &self.verify_sync_info.is_some())
            .field("handle_sync_info", &self.handle_sync_info.is_some())
            .finish()
    }
}

//! # Consensus Gossip Service
//!
//! Wires the admission controller, broadcast queue, worker and relay into one
//! subsystem with an explicit lifecycle.
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──configure──→ Configured ──start──→ Running ──stop──→ Stopped
//!    └──────────────────start───────────────────↗
//! ```
//!
//! The network layer starts before the consensus engine can verify anything,
//! so `start` is allowed from `Created`. Until `configure` runs, admitted
//! messages are relayed unverified. `configure` is still accepted once while
//! running.
//!
//! ## Dependencies
//!
//! - `C: ChainReader` - Head height and read-only chain view
//! - `N: PeerBroadcaster` - Peer set and per-kind sends

use parking_lot::Mutex;
use shared_types::{ConsensusError, SyncInfo, Timeout, Vote};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::info;

use crate::admission::MessageAdmissionController;
use crate::domain::{ConsensusMessage, GossipConfig, LifecycleState, MessageKind, PeerId};
use crate::events::GossipError;
use crate::metrics::{GossipMetrics, GossipMetricsSnapshot};
use crate::ports::inbound::ConsensusMessageReceiver;
use crate::ports::outbound::{ChainReader, ConsensusHooks, PeerBroadcaster};
use crate::relay::GossipRelay;
use crate::worker::{BroadcastQueue, BroadcastWorker};

/// Consensus message admission and gossip relay subsystem.
///
/// ## Thread Safety
///
/// Shareable across peer sessions via `Arc`. All mutable state is internally
/// synchronized.
pub struct ConsensusGossipService<C, N>
where
    C: ChainReader,
    N: PeerBroadcaster,
{
    config: GossipConfig,
    admission: MessageAdmissionController<C>,
    relay: Arc<GossipRelay<N>>,
    metrics: Arc<GossipMetrics>,
    state: Mutex<LifecycleState>,
    /// Taken by the worker on `start`.
    queue_rx: Mutex<Option<mpsc::Receiver<ConsensusMessage>>>,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<C, N> ConsensusGossipService<C, N>
where
    C: ChainReader,
    N: PeerBroadcaster + 'static,
{
    pub fn new(config: GossipConfig, chain: Arc<C>, network: Arc<N>) -> Result<Self, GossipError> {
        config.validate()?;

        let metrics = Arc::new(GossipMetrics::default());
        let (queue, queue_rx) =
            BroadcastQueue::new(config.broadcast_queue_capacity, Arc::clone(&metrics));
        let relay = Arc::new(GossipRelay::new(
            network,
            config.known_set_capacity,
            Arc::clone(&metrics),
        ));
        let admission =
            MessageAdmissionController::new(chain, config.clone(), queue, Arc::clone(&metrics));

        Ok(Self {
            config,
            admission,
            relay,
            metrics,
            state: Mutex::new(LifecycleState::Created),
            queue_rx: Mutex::new(Some(queue_rx)),
            shutdown_tx: Mutex::new(None),
            worker: Mutex::new(None),
        })
    }

    /// Inject the consensus engine's verify/handle functions.
    ///
    /// May be called once, before or after `start`.
    pub fn configure(
        &self,
        hooks: ConsensusHooks,
        epoch_length: Option<u64>,
    ) -> Result<(), GossipError> {
        let mut state = self.state.lock();
        if self.admission.is_configured() {
            return Err(GossipError::AlreadyConfigured);
        }
        match *state {
            LifecycleState::Created => *state = LifecycleState::Configured,
            LifecycleState::Running => {}
            current => {
                return Err(GossipError::InvalidState {
                    action: "configure",
                    state: current,
                })
            }
        }
        self.admission.configure(hooks, epoch_length);
        Ok(())
    }

    /// Spawn the broadcast worker on the current Tokio runtime.
    pub fn start(&self) -> Result<(), GossipError> {
        let mut state = self.state.lock();
        if !matches!(*state, LifecycleState::Created | LifecycleState::Configured) {
            return Err(GossipError::InvalidState {
                action: "start",
                state: *state,
            });
        }

        let runtime = tokio::runtime::Handle::try_current().map_err(|_| GossipError::NoRuntime)?;
        let receiver = self
            .queue_rx
            .lock()
            .take()
            .ok_or(GossipError::InvalidState {
                action: "start",
                state: *state,
            })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let worker = BroadcastWorker::new(receiver, Arc::clone(&self.relay));
        let handle = runtime.spawn(worker.run(shutdown_rx));

        *self.shutdown_tx.lock() = Some(shutdown_tx);
        *self.worker.lock() = Some(handle);
        if !self.admission.is_configured() {
            info!("Starting consensus gossip before consensus engine is attached");
        }
        *state = LifecycleState::Running;
        Ok(())
    }

    /// Fire the shutdown signal. In-flight fan-outs are not awaited.
    pub fn stop(&self) -> Result<(), GossipError> {
        let mut state = self.state.lock();
        if *state != LifecycleState::Running {
            return Err(GossipError::InvalidState {
                action: "stop",
                state: *state,
            });
        }
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        *state = LifecycleState::Stopped;
        Ok(())
    }

    /// Wait for the worker loop to exit after `stop`.
    pub async fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn config(&self) -> &GossipConfig {
        &self.config
    }

    pub fn epoch_length(&self) -> u64 {
        self.admission.epoch_length()
    }

    pub fn metrics(&self) -> GossipMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether `peer` is known to have the message with `hash`.
    pub fn peer_knows(&self, peer: &PeerId, kind: MessageKind, hash: &shared_types::Hash) -> bool {
        self.relay.peer_knows(peer, kind, hash)
    }

    pub fn tracked_peers(&self) -> usize {
        self.relay.tracked_peers()
    }
}

impl<C, N> ConsensusMessageReceiver for ConsensusGossipService<C, N>
where
    C: ChainReader,
    N: PeerBroadcaster + 'static,
{
    fn handle_vote(&self, peer: PeerId, vote: Vote) -> Result<(), ConsensusError> {
        let hash = vote.hash();
        self.relay.mark_known(peer, MessageKind::Vote, hash);
        self.admission.admit(&peer, hash, vote)
    }

    fn handle_timeout(&self, peer: PeerId, timeout: Timeout) -> Result<(), ConsensusError> {
        let hash = timeout.hash();
        self.relay.mark_known(peer, MessageKind::Timeout, hash);
        self.admission.admit(&peer, hash, timeout)
    }

    fn handle_sync_info(&self, peer: PeerId, sync_info: SyncInfo) -> Result<(), ConsensusError> {
        let hash = sync_info.hash();
        self.relay.mark_known(peer, MessageKind::SyncInfo, hash);
        self.admission.admit(&peer, hash, sync_info)
    }

    fn peer_connected(&self, peer: PeerId) {
        self.relay.peer_connected(peer);
    }

    fn peer_disconnected(&self, peer: PeerId) {
        self.relay.peer_disconnected(&peer);
    }
}

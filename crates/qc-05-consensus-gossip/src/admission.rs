//! # Message Admission Controller
//!
//! Decides cheaply and safely whether an inbound consensus message is worth
//! processing and relaying.
//!
//! ## Pipeline (identical for every kind)
//!
//! 1. **Dedup**: record the content hash in the kind's LRU cache; drop if it
//!    was already there. Recording happens before verification so concurrent
//!    deliveries of the same message from several peers cannot both proceed.
//! 2. **Admission window**: drop messages whose reference height is too far
//!    from the local head (±7 blocks, timeouts ±3 epochs).
//! 3. **Engine not attached**: queue for broadcast and succeed.
//! 4. **Verify**: hard errors are returned unchanged, a negative result is a
//!    silent drop.
//! 5. **Relay, then handle**: queue for broadcast, then hand to the engine.
//!    Handler errors are returned unchanged.
//!
//! Only steps 4 and 5 can produce a caller-visible error.

use parking_lot::RwLock;
use shared_types::{ConsensusError, Hash, SyncInfo, Timeout, Vote};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace, warn};

use crate::domain::{
    admission_window, within_window, BoundedDedupCache, ConsensusMessage, GossipConfig,
    MessageKind, PeerId,
};
use crate::metrics::{AdmissionOutcome, GossipMetrics};
use crate::ports::outbound::{ChainReader, ConsensusHooks, HandleFn, VerifyFn};
use crate::worker::BroadcastQueue;

/// A message kind that can run through the admission pipeline.
pub(crate) trait Admissible: Clone + Into<ConsensusMessage> {
    const KIND: MessageKind;

    fn reference_height(&self) -> u64;

    fn select_hooks(hooks: &ConsensusHooks) -> (Option<VerifyFn<Self>>, Option<HandleFn<Self>>);
}

impl Admissible for Vote {
    const KIND: MessageKind = MessageKind::Vote;

    fn reference_height(&self) -> u64 {
        Vote::reference_height(self)
    }

    fn select_hooks(hooks: &ConsensusHooks) -> (Option<VerifyFn<Self>>, Option<HandleFn<Self>>) {
        (hooks.verify_vote.clone(), hooks.handle_vote.clone())
    }
}

impl Admissible for Timeout {
    const KIND: MessageKind = MessageKind::Timeout;

    fn reference_height(&self) -> u64 {
        Timeout::reference_height(self)
    }

    fn select_hooks(hooks: &ConsensusHooks) -> (Option<VerifyFn<Self>>, Option<HandleFn<Self>>) {
        (hooks.verify_timeout.clone(), hooks.handle_timeout.clone())
    }
}

impl Admissible for SyncInfo {
    const KIND: MessageKind = MessageKind::SyncInfo;

    fn reference_height(&self) -> u64 {
        SyncInfo::reference_height(self)
    }

    fn select_hooks(hooks: &ConsensusHooks) -> (Option<VerifyFn<Self>>, Option<HandleFn<Self>>) {
        (hooks.verify_sync_info.clone(), hooks.handle_sync_info.clone())
    }
}

/// Admission pipeline for votes, timeouts and sync-infos.
///
/// ## Thread Safety
///
/// Entry points are called concurrently from every peer's session. The dedup
/// caches are internally locked. The injected hooks sit behind a read-write
/// lock that is held only long enough to clone the function handles, never
/// while verify or handle run.
pub struct MessageAdmissionController<C: ChainReader> {
    chain: Arc<C>,
    config: GossipConfig,
    /// One LRU dedup cache per message kind, indexed by `MessageKind::index`.
    caches: [BoundedDedupCache; 3],
    hooks: RwLock<Option<ConsensusHooks>>,
    epoch_length: AtomicU64,
    queue: BroadcastQueue,
    metrics: Arc<GossipMetrics>,
}

impl<C: ChainReader> MessageAdmissionController<C> {
    pub fn new(
        chain: Arc<C>,
        config: GossipConfig,
        queue: BroadcastQueue,
        metrics: Arc<GossipMetrics>,
    ) -> Self {
        let size = config.dedup_cache_size;
        Self {
            chain,
            caches: [
                BoundedDedupCache::new(size),
                BoundedDedupCache::new(size),
                BoundedDedupCache::new(size),
            ],
            epoch_length: AtomicU64::new(config.default_epoch_length),
            hooks: RwLock::new(None),
            config,
            queue,
            metrics,
        }
    }

    /// Inject the consensus engine's functions and initialize the epoch length.
    ///
    /// An unset or zero epoch length falls back to the configured default.
    pub fn configure(&self, hooks: ConsensusHooks, epoch_length: Option<u64>) {
        let epoch = epoch_length
            .filter(|e| *e > 0)
            .unwrap_or(self.config.default_epoch_length);
        self.epoch_length.store(epoch, Ordering::Release);
        *self.hooks.write() = Some(hooks);
        debug!(epoch_length = epoch, "Consensus hooks configured");
    }

    pub fn is_configured(&self) -> bool {
        self.hooks.read().is_some()
    }

    pub fn epoch_length(&self) -> u64 {
        self.epoch_length.load(Ordering::Acquire)
    }

    /// Dedup cache for a kind.
    pub fn cache(&self, kind: MessageKind) -> &BoundedDedupCache {
        &self.caches[kind.index()]
    }

    pub fn vote(&self, peer: &PeerId, vote: Vote) -> Result<(), ConsensusError> {
        let hash = vote.hash();
        self.admit(peer, hash, vote)
    }

    pub fn timeout(&self, peer: &PeerId, timeout: Timeout) -> Result<(), ConsensusError> {
        let hash = timeout.hash();
        self.admit(peer, hash, timeout)
    }

    pub fn sync_info(&self, peer: &PeerId, sync_info: SyncInfo) -> Result<(), ConsensusError> {
        let hash = sync_info.hash();
        self.admit(peer, hash, sync_info)
    }

    /// Run `message` (whose content hash is `hash`) through the pipeline.
    pub(crate) fn admit<M: Admissible>(
        &self,
        peer: &PeerId,
        hash: Hash,
        message: M,
    ) -> Result<(), ConsensusError> {
        let kind = M::KIND;
        self.metrics.record_received();

        if !self.cache(kind).insert_if_absent(hash) {
            trace!(peer = %peer.short(), %kind, hash = %hex::encode(hash), "Discarded known message");
            self.metrics.record_admission(kind, AdmissionOutcome::Duplicate);
            return Ok(());
        }

        let current = self.chain.current_height();
        let reference = message.reference_height();
        let window = admission_window(kind, &self.config, self.epoch_length());
        if !within_window(reference, current, window) {
            debug!(
                peer = %peer.short(),
                %kind,
                reference,
                current,
                window,
                "Discarded message outside admission window"
            );
            self.metrics.record_admission(kind, AdmissionOutcome::OutOfWindow);
            return Ok(());
        }

        let (verify, handle) = match self.hooks.read().as_ref() {
            Some(hooks) => M::select_hooks(hooks),
            None => (None, None),
        };

        let Some(verify) = verify else {
            trace!(%kind, "Consensus engine not attached, relaying unverified");
            self.queue.enqueue(message.into());
            self.metrics.record_admission(kind, AdmissionOutcome::Unverified);
            return Ok(());
        };

        let chain: &dyn ChainReader = self.chain.as_ref();
        match verify(chain, &message) {
            Ok(true) => {}
            Ok(false) => {
                debug!(peer = %peer.short(), %kind, "Message not accepted by consensus rules");
                self.metrics.record_admission(kind, AdmissionOutcome::Rejected);
                return Ok(());
            }
            Err(e) => {
                debug!(peer = %peer.short(), %kind, error = %e, "Message failed verification");
                self.metrics.record_admission(kind, AdmissionOutcome::VerifyFailed);
                return Err(e);
            }
        }

        match handle {
            Some(handle) => {
                self.queue.enqueue(message.clone().into());
                if let Err(e) = handle(chain, &message) {
                    warn!(%kind, error = %e, "Consensus engine failed to handle message");
                    self.metrics.record_admission(kind, AdmissionOutcome::HandleFailed);
                    return Err(e);
                }
            }
            None => {
                self.queue.enqueue(message.into());
            }
        }

        self.metrics.record_admission(kind, AdmissionOutcome::Accepted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{BlockInfo, QuorumCert};
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    // ==========================================================================
    // MOCK IMPLEMENTATIONS FOR TESTING
    // ==========================================================================

    struct MockChain {
        height: AtomicU64,
    }

    impl MockChain {
        fn at(height: u64) -> Arc<Self> {
            Arc::new(Self {
                height: AtomicU64::new(height),
            })
        }
    }

    impl ChainReader for MockChain {
        fn current_height(&self) -> u64 {
            self.height.load(Ordering::SeqCst)
        }

        fn block_hash(&self, _number: u64) -> Option<Hash> {
            None
        }
    }

    struct Harness {
        controller: MessageAdmissionController<MockChain>,
        queue_rx: mpsc::Receiver<ConsensusMessage>,
        metrics: Arc<GossipMetrics>,
    }

    impl Harness {
        fn new(height: u64) -> Self {
            let metrics = Arc::new(GossipMetrics::default());
            let (queue, queue_rx) = BroadcastQueue::new(256, Arc::clone(&metrics));
            let controller = MessageAdmissionController::new(
                MockChain::at(height),
                GossipConfig::default(),
                queue,
                Arc::clone(&metrics),
            );
            Self {
                controller,
                queue_rx,
                metrics,
            }
        }

        fn drain(&mut self) -> Vec<ConsensusMessage> {
            let mut out = Vec::new();
            while let Ok(msg) = self.queue_rx.try_recv() {
                out.push(msg);
            }
            out
        }
    }

    #[derive(Default)]
    struct Calls {
        verify: AtomicUsize,
        handle: AtomicUsize,
    }

    fn vote_at(number: u64) -> Vote {
        Vote::new(BlockInfo::new([0xAB; 32], 1, number), vec![1, 2, 3], 0)
    }

    fn peer() -> PeerId {
        PeerId::new([1u8; 32])
    }

    fn counting_vote_hooks(calls: &Arc<Calls>, verdict: Result<bool, ConsensusError>) -> ConsensusHooks {
        let v = Arc::clone(calls);
        let h = Arc::clone(calls);
        ConsensusHooks::default().with_vote(
            move |_, _| {
                v.verify.fetch_add(1, Ordering::SeqCst);
                verdict.clone()
            },
            move |_, _| {
                h.handle.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        )
    }

    #[test]
    fn test_accepted_vote_is_queued_once() {
        let mut harness = Harness::new(1000);
        let calls = Arc::new(Calls::default());
        harness
            .controller
            .configure(counting_vote_hooks(&calls, Ok(true)), None);

        assert!(harness.controller.vote(&peer(), vote_at(1005)).is_ok());

        let queued = harness.drain();
        assert_eq!(queued, vec![ConsensusMessage::Vote(vote_at(1005))]);
        assert_eq!(calls.verify.load(Ordering::SeqCst), 1);
        assert_eq!(calls.handle.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_far_vote_dropped_before_verify() {
        let mut harness = Harness::new(1000);
        let calls = Arc::new(Calls::default());
        harness
            .controller
            .configure(counting_vote_hooks(&calls, Ok(true)), None);

        assert!(harness.controller.vote(&peer(), vote_at(1010)).is_ok());

        assert_eq!(calls.verify.load(Ordering::SeqCst), 0);
        assert!(harness.drain().is_empty());
        assert_eq!(harness.metrics.snapshot().out_of_window, 1);
    }

    #[test]
    fn test_vote_window_boundaries() {
        let mut harness = Harness::new(1000);
        let calls = Arc::new(Calls::default());
        harness
            .controller
            .configure(counting_vote_hooks(&calls, Ok(true)), None);

        for number in [993, 1007, 992, 1008] {
            harness.controller.vote(&peer(), vote_at(number)).unwrap();
        }

        assert_eq!(calls.verify.load(Ordering::SeqCst), 2);
        assert_eq!(harness.drain().len(), 2);
    }

    #[test]
    fn test_duplicate_vote_processed_once() {
        let mut harness = Harness::new(1000);
        let calls = Arc::new(Calls::default());
        harness
            .controller
            .configure(counting_vote_hooks(&calls, Ok(true)), None);

        harness.controller.vote(&peer(), vote_at(1000)).unwrap();
        harness
            .controller
            .vote(&PeerId::new([2u8; 32]), vote_at(1000))
            .unwrap();

        assert_eq!(calls.verify.load(Ordering::SeqCst), 1);
        assert_eq!(calls.handle.load(Ordering::SeqCst), 1);
        assert_eq!(harness.drain().len(), 1);
        assert_eq!(harness.metrics.snapshot().duplicates, 1);
    }

    #[test]
    fn test_out_of_window_message_is_still_remembered() {
        let harness = Harness::new(1000);
        let vote = vote_at(2000);
        harness.controller.vote(&peer(), vote.clone()).unwrap();
        assert!(harness.controller.cache(MessageKind::Vote).contains(&vote.hash()));
    }

    #[test]
    fn test_unconfigured_relays_unverified() {
        let mut harness = Harness::new(1000);

        harness.controller.vote(&peer(), vote_at(1000)).unwrap();
        harness
            .controller
            .timeout(&peer(), Timeout::new(5, vec![], 1000))
            .unwrap();

        assert_eq!(harness.drain().len(), 2);
        assert_eq!(harness.metrics.snapshot().unverified, 2);
    }

    #[test]
    fn test_verify_error_is_propagated_and_not_queued() {
        let mut harness = Harness::new(1000);
        let calls = Arc::new(Calls::default());
        harness.controller.configure(
            counting_vote_hooks(&calls, Err(ConsensusError::InvalidSignature)),
            None,
        );

        let result = harness.controller.vote(&peer(), vote_at(1000));

        assert_eq!(result, Err(ConsensusError::InvalidSignature));
        assert!(harness.drain().is_empty());
        assert_eq!(calls.handle.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_negative_verify_drops_silently() {
        let mut harness = Harness::new(1000);
        let calls = Arc::new(Calls::default());
        harness
            .controller
            .configure(counting_vote_hooks(&calls, Ok(false)), None);

        assert!(harness.controller.vote(&peer(), vote_at(1000)).is_ok());

        assert!(harness.drain().is_empty());
        assert_eq!(calls.handle.load(Ordering::SeqCst), 0);
        assert_eq!(harness.metrics.snapshot().rejected, 1);
    }

    #[test]
    fn test_handle_error_is_propagated_after_queueing() {
        let mut harness = Harness::new(1000);
        let hooks = ConsensusHooks::default().with_vote(
            |_, _| Ok(true),
            |_, _| Err(ConsensusError::Engine("tally failed".into())),
        );
        harness.controller.configure(hooks, None);

        let result = harness.controller.vote(&peer(), vote_at(1000));

        assert_eq!(result, Err(ConsensusError::Engine("tally failed".into())));
        assert_eq!(harness.drain().len(), 1);
    }

    #[test]
    fn test_timeout_window_uses_default_epoch() {
        let mut harness = Harness::new(1000);
        harness.controller.configure(ConsensusHooks::default(), None);
        assert_eq!(harness.controller.epoch_length(), 900);

        harness
            .controller
            .timeout(&peer(), Timeout::new(1, vec![], 3700))
            .unwrap();
        harness
            .controller
            .timeout(&peer(), Timeout::new(2, vec![], 3701))
            .unwrap();

        assert_eq!(harness.drain().len(), 1);
    }

    #[test]
    fn test_timeout_window_uses_configured_epoch() {
        let mut harness = Harness::new(1000);
        harness.controller.configure(ConsensusHooks::default(), Some(10));

        harness
            .controller
            .timeout(&peer(), Timeout::new(1, vec![], 1030))
            .unwrap();
        harness
            .controller
            .timeout(&peer(), Timeout::new(2, vec![], 1031))
            .unwrap();

        assert_eq!(harness.drain().len(), 1);
    }

    #[test]
    fn test_sync_info_uses_qc_height() {
        let mut harness = Harness::new(1000);
        let near = SyncInfo::new(
            QuorumCert {
                proposed_block_info: BlockInfo::new([1u8; 32], 9, 995),
                ..Default::default()
            },
            None,
        );
        let far = SyncInfo::new(
            QuorumCert {
                proposed_block_info: BlockInfo::new([2u8; 32], 9, 980),
                ..Default::default()
            },
            None,
        );

        harness.controller.sync_info(&peer(), near.clone()).unwrap();
        harness.controller.sync_info(&peer(), far).unwrap();

        assert_eq!(harness.drain(), vec![ConsensusMessage::SyncInfo(near)]);
    }

    #[test]
    fn test_kinds_have_independent_caches() {
        let harness = Harness::new(0);
        let timeout = Timeout::new(1, vec![], 0);
        let hash = timeout.hash();
        harness.controller.timeout(&peer(), timeout).unwrap();

        assert!(harness.controller.cache(MessageKind::Timeout).contains(&hash));
        assert!(!harness.controller.cache(MessageKind::Vote).contains(&hash));
    }

    #[test]
    fn test_concurrent_duplicates_handled_once() {
        let harness = Harness::new(1000);
        let calls = Arc::new(Calls::default());
        let h = Arc::clone(&calls);
        let hooks = ConsensusHooks::default().with_timeout(
            |_, _| Ok(true),
            move |_, _| {
                h.handle.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        harness.controller.configure(hooks, None);

        let timeout = Timeout::new(7, vec![0xEE; 65], 1000);
        std::thread::scope(|s| {
            for i in 0..8u8 {
                let controller = &harness.controller;
                let timeout = timeout.clone();
                s.spawn(move || {
                    controller
                        .timeout(&PeerId::new([i; 32]), timeout)
                        .unwrap();
                });
            }
        });

        assert_eq!(calls.handle.load(Ordering::SeqCst), 1);
    }
}

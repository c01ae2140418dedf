//! # Consensus Gossip Subsystem (qc-05)
//!
//! Admission control and gossip relay for BFT consensus messages (votes,
//! timeouts, sync-infos).
//!
//! ## Architecture Role
//!
//! ```text
//! [Peer session] ──handle_vote/timeout/sync_info──→ [Admission Controller]
//!                                                        │ dedup → window → verify → handle
//!                                                        ↓
//!                                                 [Broadcast Queue (256)]
//!                                                        │
//!                                                        ↓ worker, one task per message
//!                                                  [Gossip Relay]
//!                                               ┌───────┴───────┐
//!                                               ↓               ↓
//!                                          [Peer A]        [Peer B] ...
//! ```
//!
//! The consensus engine attaches late through [`ConsensusHooks`]; until then
//! admitted messages are relayed unverified.
//!
//! ## Error Policy
//!
//! - Duplicates and out-of-window messages: silent drop
//! - Verification errors: returned unchanged to the peer session
//! - Negative verification: silent drop
//! - Handling errors: returned unchanged
//! - Full queue, failed peer sends: logged only

pub mod admission;
pub mod domain;
pub mod events;
pub mod metrics;
pub mod ports;
pub mod relay;
pub mod service;
pub mod worker;

pub use admission::MessageAdmissionController;
pub use domain::*;
pub use events::{ConfigError, GossipError};
pub use metrics::{GossipMetrics, GossipMetricsSnapshot};
pub use ports::inbound::ConsensusMessageReceiver;
pub use ports::outbound::{ChainReader, ConsensusHooks, HandleFn, PeerBroadcaster, VerifyFn};
pub use relay::{FanoutReport, GossipRelay, PeerKnowledgeTracker};
pub use service::ConsensusGossipService;
pub use worker::{BroadcastQueue, BroadcastWorker};

//! # Gossip Metrics
//!
//! Lock-free counters for every admission and relay outcome, plus optional
//! Prometheus export.
//!
//! ## Usage
//!
//! Enable Prometheus export with the `metrics` feature:
//! ```toml
//! qc-05-consensus-gossip = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `consensus_gossip_admission_total` - Admission outcomes (by kind, outcome)
//! - `consensus_gossip_relay_total` - Relay outcomes (by outcome)

use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::MessageKind;

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter_vec, IntCounterVec};

#[cfg(feature = "metrics")]
lazy_static! {
    /// Admission outcomes, labeled by message kind and outcome
    pub static ref ADMISSION_OUTCOMES: IntCounterVec = register_int_counter_vec!(
        "consensus_gossip_admission_total",
        "Consensus messages by admission outcome",
        &["kind", "outcome"]
    )
    .expect("Failed to create ADMISSION_OUTCOMES metric");

    /// Relay outcomes, labeled by outcome
    pub static ref RELAY_OUTCOMES: IntCounterVec = register_int_counter_vec!(
        "consensus_gossip_relay_total",
        "Consensus message sends by relay outcome",
        &["outcome"]
    )
    .expect("Failed to create RELAY_OUTCOMES metric");
}

/// Outcome of running a message through the admission pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionOutcome {
    Duplicate,
    OutOfWindow,
    Unverified,
    Rejected,
    VerifyFailed,
    Accepted,
    HandleFailed,
}

impl AdmissionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionOutcome::Duplicate => "duplicate",
            AdmissionOutcome::OutOfWindow => "out_of_window",
            AdmissionOutcome::Unverified => "unverified",
            AdmissionOutcome::Rejected => "rejected",
            AdmissionOutcome::VerifyFailed => "verify_failed",
            AdmissionOutcome::Accepted => "accepted",
            AdmissionOutcome::HandleFailed => "handle_failed",
        }
    }
}

/// Counters shared by the controller, queue and relay.
#[derive(Debug, Default)]
pub struct GossipMetrics {
    received: AtomicU64,
    duplicates: AtomicU64,
    out_of_window: AtomicU64,
    unverified: AtomicU64,
    rejected: AtomicU64,
    verify_failed: AtomicU64,
    accepted: AtomicU64,
    handle_failed: AtomicU64,
    enqueued: AtomicU64,
    queue_dropped: AtomicU64,
    sent: AtomicU64,
    skipped: AtomicU64,
    send_failed: AtomicU64,
    /// Admission outcomes per kind, indexed by `MessageKind::index`.
    by_kind: [AtomicU64; 3],
}

/// Point-in-time copy of [`GossipMetrics`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GossipMetricsSnapshot {
    pub received: u64,
    pub duplicates: u64,
    pub out_of_window: u64,
    pub unverified: u64,
    pub rejected: u64,
    pub verify_failed: u64,
    pub accepted: u64,
    pub handle_failed: u64,
    pub enqueued: u64,
    pub queue_dropped: u64,
    pub sent: u64,
    pub skipped: u64,
    pub send_failed: u64,
    pub votes: u64,
    pub timeouts: u64,
    pub sync_infos: u64,
}

impl GossipMetrics {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admission(&self, kind: MessageKind, outcome: AdmissionOutcome) {
        let counter = match outcome {
            AdmissionOutcome::Duplicate => &self.duplicates,
            AdmissionOutcome::OutOfWindow => &self.out_of_window,
            AdmissionOutcome::Unverified => &self.unverified,
            AdmissionOutcome::Rejected => &self.rejected,
            AdmissionOutcome::VerifyFailed => &self.verify_failed,
            AdmissionOutcome::Accepted => &self.accepted,
            AdmissionOutcome::HandleFailed => &self.handle_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        self.by_kind[kind.index()].fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "metrics")]
        ADMISSION_OUTCOMES
            .with_label_values(&[kind.as_str(), outcome.as_str()])
            .inc();
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_queue_dropped(&self) {
        self.queue_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        RELAY_OUTCOMES.with_label_values(&["sent"]).inc();
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failed(&self) {
        self.send_failed.fetch_add(1, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        RELAY_OUTCOMES.with_label_values(&["failed"]).inc();
    }

    pub fn snapshot(&self) -> GossipMetricsSnapshot {
        GossipMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            out_of_window: self.out_of_window.load(Ordering::Relaxed),
            unverified: self.unverified.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            verify_failed: self.verify_failed.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            handle_failed: self.handle_failed.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            queue_dropped: self.queue_dropped.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            send_failed: self.send_failed.load(Ordering::Relaxed),
            votes: self.by_kind[MessageKind::Vote.index()].load(Ordering::Relaxed),
            timeouts: self.by_kind[MessageKind::Timeout.index()].load(Ordering::Relaxed),
            sync_infos: self.by_kind[MessageKind::SyncInfo.index()].load(Ordering::Relaxed),
        }
    }
}

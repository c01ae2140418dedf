//! Admission window invariants.
//!
//! Messages far from the local chain head are either stale or speculative
//! floods; both are dropped before any verification work is spent on them.

use super::{GossipConfig, MessageKind};

/// Admission window (in blocks) for a message kind.
///
/// Votes and sync-infos are measured in blocks. Timeouts are anchored to a gap
/// number and may trail the head by several epochs of clock skew, so their
/// window scales with the epoch length.
pub fn admission_window(kind: MessageKind, config: &GossipConfig, epoch_length: u64) -> u64 {
    match kind {
        MessageKind::Vote | MessageKind::SyncInfo => config.vote_window,
        MessageKind::Timeout => config.timeout_window_epochs.saturating_mul(epoch_length),
    }
}

/// INVARIANT: `|reference - current| <= window`.
pub fn within_window(reference: u64, current: u64, window: u64) -> bool {
    reference.abs_diff(current) <= window
}

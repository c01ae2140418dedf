//! Value objects for gossip configuration and bounded hash sets.

use lru::LruCache;
use parking_lot::Mutex;
use shared_types::Hash;
use std::env;
use std::num::NonZeroUsize;
use std::str::FromStr;

use crate::events::ConfigError;

/// Lifecycle of the gossip subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed; no consensus functions injected, worker not running.
    Created,
    /// Verify/handle functions injected and epoch initialized.
    Configured,
    /// Broadcast worker loop active.
    Running,
    /// Shutdown signal fired.
    Stopped,
}

/// Consensus gossip configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GossipConfig {
    /// Capacity of each per-kind ingestion dedup cache.
    pub dedup_cache_size: usize,
    /// Capacity of each per-peer, per-kind known-hash set.
    pub known_set_capacity: usize,
    /// Capacity of the outbound broadcast queue.
    pub broadcast_queue_capacity: usize,
    /// Admission window (in blocks) for votes and sync-infos.
    pub vote_window: u64,
    /// Timeout admission window, in epochs.
    pub timeout_window_epochs: u64,
    /// Epoch length used when the protocol parameter is unset.
    pub default_epoch_length: u64,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            dedup_cache_size: 1024,
            known_set_capacity: 131_072,
            broadcast_queue_capacity: 256,
            vote_window: 7,
            timeout_window_epochs: 3,
            default_epoch_length: 900,
        }
    }
}

impl GossipConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `QC_GOSSIP_DEDUP_CACHE_SIZE`: Per-kind dedup cache size (default: 1024)
    /// - `QC_GOSSIP_KNOWN_SET_CAPACITY`: Per-peer known set size (default: 131072)
    /// - `QC_GOSSIP_QUEUE_CAPACITY`: Broadcast queue capacity (default: 256)
    /// - `QC_GOSSIP_EPOCH_LENGTH`: Fallback epoch length (default: 900)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            dedup_cache_size: env_or("QC_GOSSIP_DEDUP_CACHE_SIZE", defaults.dedup_cache_size),
            known_set_capacity: env_or("QC_GOSSIP_KNOWN_SET_CAPACITY", defaults.known_set_capacity),
            broadcast_queue_capacity: env_or(
                "QC_GOSSIP_QUEUE_CAPACITY",
                defaults.broadcast_queue_capacity,
            ),
            default_epoch_length: env_or("QC_GOSSIP_EPOCH_LENGTH", defaults.default_epoch_length),
            ..defaults
        }
    }

    /// Reject configurations that would make a bounded structure unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capacities = [
            ("dedup_cache_size", self.dedup_cache_size),
            ("known_set_capacity", self.known_set_capacity),
            ("broadcast_queue_capacity", self.broadcast_queue_capacity),
        ];
        for (field, value) in capacities {
            if value == 0 {
                return Err(ConfigError::ZeroCapacity { field });
            }
        }
        if self.default_epoch_length == 0 {
            return Err(ConfigError::ZeroEpochLength);
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn non_zero(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

/// Fixed-capacity LRU set of message hashes (ingestion deduplication).
///
/// A duplicate hit refreshes the entry's recency, so hashes that keep arriving
/// stay resident while stale ones age out.
pub struct BoundedDedupCache {
    cache: Mutex<LruCache<Hash, ()>>,
}

impl BoundedDedupCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(non_zero(capacity))),
        }
    }

    /// Atomically record `hash`. Returns `false` if it was already present.
    pub fn insert_if_absent(&self, hash: Hash) -> bool {
        let mut cache = self.cache.lock();
        if cache.get(&hash).is_some() {
            return false;
        }
        cache.put(hash, ());
        true
    }

    /// Check membership without touching recency.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.cache.lock().contains(hash)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.lock().cap().get()
    }
}

/// Capacity-bounded set of hashes a single peer is known to have.
///
/// When full, the least recently *inserted* hash is evicted. Membership checks
/// do not refresh an entry, so a hash is resident for exactly `capacity`
/// subsequent insertions.
///
/// Storage grows with traffic; `capacity` is an upper bound, not a
/// reservation.
pub struct KnownHashSet {
    hashes: LruCache<Hash, ()>,
    capacity: usize,
}

impl KnownHashSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            hashes: LruCache::unbounded(),
            capacity: capacity.max(1),
        }
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.hashes.contains(hash)
    }

    /// Insert `hash`, evicting the oldest member if at capacity.
    ///
    /// Returns `false` if the hash was already known.
    pub fn mark(&mut self, hash: Hash) -> bool {
        if self.hashes.contains(&hash) {
            return false;
        }
        if self.hashes.len() >= self.capacity {
            self.hashes.pop_lru();
        }
        self.hashes.push(hash, ());
        true
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

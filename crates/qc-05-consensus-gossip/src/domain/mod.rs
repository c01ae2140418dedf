//! # Domain Layer for Consensus Gossip
//!
//! Pure data structures and rules with no I/O dependencies.
//!
//! ## Contents
//!
//! - **entities**: `MessageKind`, `ConsensusMessage`, `PeerId`
//! - **value_objects**: `GossipConfig`, `BoundedDedupCache`, `KnownHashSet`
//! - **invariants**: Admission window checks

mod entities;
mod invariants;
mod value_objects;

pub use entities::*;
pub use invariants::*;
pub use value_objects::*;

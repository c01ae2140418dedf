//! # Shared Types Crate
//!
//! Consensus message entities and the error type shared between the gossip
//! layer and the consensus engine.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: Every message kind the gossip layer relays is
//!   defined here, together with its content hash.
//! - **Opaque Signatures**: Signatures are carried, hashed and relayed but never
//!   interpreted outside the consensus engine.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;

//! Hexagonal ports for the consensus gossip subsystem.

pub mod inbound;
pub mod outbound;

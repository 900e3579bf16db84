//! Gossip message model
//!
//! A [`GossipMessage`] is one broadcast making its way through the cluster.
//! Its `id` is fixed at the origin and is what every node deduplicates on;
//! `from` and `ttl` are rewritten by each forwarder.
pub mod messages;

pub use messages::{GossipMessage, Payload};

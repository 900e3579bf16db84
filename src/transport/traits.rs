//! Transport trait for node-to-node delivery
//!
//! Nodes only ever talk to an `Arc<dyn Transport>`, so the in-process
//! [`MockNetwork`](super::MockNetwork) can be swapped for a real network
//! implementation without touching the gossip logic.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::gossip::GossipMessage;
use crate::node::{Node, NodeName};

/// Best-effort, fire-and-forget message delivery between registered nodes
#[async_trait]
pub trait Transport: Send + Sync {
    /// Make a node reachable as a `send` destination
    async fn register_node(&self, node: &Arc<Node>) -> Result<()>;

    /// Send a message to a peer. Delivery is not acknowledged: loss and
    /// unknown destinations are silent.
    async fn send(&self, from: &NodeName, to: &NodeName, msg: GossipMessage);
}

//! Gossip node
//!
//! A [`Node`] owns its replicated state, its peer list, the set of message ids
//! it has already processed, and its counters, all behind one mutex that no
//! other node shares. Receiving a message is the epidemic step: deduplicate,
//! apply, and (while hops remain) hand a random subset of peers a copy on a
//! separate task so the delivering caller never waits on fan-out.
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::runtime::Handle;
use tracing::{debug, error, trace};

pub mod node_id;

use crate::error::{Result, SimError};
use crate::gossip::{GossipMessage, Payload};
use crate::random::{partial_shuffle, RandomSource};
use crate::transport::Transport;
pub use node_id::NodeName;

/// Per-node message counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    /// Every delivery, duplicates included
    pub messages_received: u64,
    pub messages_sent: u64,
    pub duplicates_ignored: u64,
}

/// What `receive_message` did with a message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// Already seen: nothing applied, nothing forwarded
    Duplicate,
    /// Applied; hop budget or fanout exhausted so it stops here
    Applied,
    /// Applied and handed to a forwarding task
    Forwarding,
}

#[derive(Debug, Default)]
struct NodeInner {
    peers: Vec<NodeName>,
    state: Payload,
    // Never pruned: memory grows with every distinct broadcast seen
    received: HashSet<String>,
    stats: NodeStats,
}

pub struct Node {
    id: NodeName,
    fanout: usize,
    transport: Arc<dyn Transport>,
    rng: Arc<dyn RandomSource>,
    // Disambiguates ids of broadcasts made on the same clock reading
    sequence: AtomicU64,
    inner: Mutex<NodeInner>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("fanout", &self.fanout)
            .finish()
    }
}

impl Node {
    pub fn new(
        id: NodeName,
        fanout: usize,
        transport: Arc<dyn Transport>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            id,
            fanout,
            transport,
            rng,
            sequence: AtomicU64::new(0),
            inner: Mutex::new(NodeInner::default()),
        }
    }

    pub fn id(&self) -> &NodeName {
        &self.id
    }

    pub fn fanout(&self) -> usize {
        self.fanout
    }

    fn lock(&self) -> Result<MutexGuard<'_, NodeInner>> {
        Ok(self.inner.lock()?)
    }

    /// Add a neighbour. Returns false if it was already a peer (or is this node).
    pub fn add_peer(&self, peer: NodeName) -> Result<bool> {
        if peer == self.id {
            return Ok(false);
        }
        let mut inner = self.lock()?;
        if inner.peers.contains(&peer) {
            return Ok(false);
        }
        inner.peers.push(peer);
        Ok(true)
    }

    /// Originate a new message. The update is applied here before anything
    /// goes out, so the origin's state never waits on a network round trip.
    pub fn broadcast(self: &Arc<Self>, payload: Payload, ttl: u32) -> Result<GossipMessage> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let msg = GossipMessage::new(&self.id, sequence, payload, ttl);
        debug!("[{}] Broadcasting {} with ttl {}", self.id, msg.id, ttl);
        self.receive_message(msg.clone())?;
        Ok(msg)
    }

    /// Deduplicate, apply, and schedule forwarding for one delivery.
    ///
    /// The dedup check and the state merge happen under one lock hold, so a
    /// message id is applied at most once no matter how deliveries interleave.
    /// Forwarding is spawned onto the tokio runtime and not awaited; a message
    /// that still has to be forwarded is rejected untouched when called
    /// outside a runtime.
    pub fn receive_message(self: &Arc<Self>, msg: GossipMessage) -> Result<ReceiveOutcome> {
        let runtime = if msg.is_exhausted() || self.fanout == 0 {
            None
        } else {
            let handle = Handle::try_current().map_err(|e| {
                SimError::Concurrency(format!("cannot forward {} without a runtime: {}", msg.id, e))
            })?;
            Some(handle)
        };

        let runtime = {
            let mut inner = self.lock()?;
            inner.stats.messages_received += 1;

            if inner.received.contains(&msg.id) {
                inner.stats.duplicates_ignored += 1;
                trace!("[{}] Ignoring duplicate {} from {}", self.id, msg.id, msg.from);
                return Ok(ReceiveOutcome::Duplicate);
            }
            inner.received.insert(msg.id.clone());

            // Last applied value wins, key by key
            for (key, value) in &msg.payload {
                inner.state.insert(key.clone(), value.clone());
            }

            let Some(runtime) = runtime else {
                debug!("[{}] Applied {} (terminal)", self.id, msg.id);
                return Ok(ReceiveOutcome::Applied);
            };
            runtime
        };

        debug!("[{}] Applied {}, forwarding with ttl {}", self.id, msg.id, msg.ttl);
        let node = Arc::clone(self);
        runtime.spawn(async move {
            node.gossip_to_peers(msg).await;
        });
        Ok(ReceiveOutcome::Forwarding)
    }

    /// Send one hop: up to `fanout` random peers, minus whoever sent it to us
    async fn gossip_to_peers(&self, msg: GossipMessage) {
        let targets: Vec<NodeName> = match self.lock() {
            Ok(mut inner) => {
                let NodeInner { peers, stats, .. } = &mut *inner;
                let targets: Vec<NodeName> =
                    partial_shuffle(self.rng.as_ref(), peers, self.fanout)
                        .iter()
                        .filter(|peer| **peer != msg.from)
                        .cloned()
                        .collect();
                stats.messages_sent += targets.len() as u64;
                targets
            }
            Err(e) => {
                error!("[{}] Failed forwarding {}: {}", self.id, msg.id, e);
                return;
            }
        };

        let forward = msg.forwarded_by(&self.id);
        for peer in targets {
            trace!("[{}] -> [{}] {} ttl {}", self.id, peer, forward.id, forward.ttl);
            self.transport.send(&self.id, &peer, forward.clone()).await;
        }
    }

    /// Copy of the node's replicated state
    pub fn get_state(&self) -> Result<Payload> {
        Ok(self.lock()?.state.clone())
    }

    pub fn get_stats(&self) -> Result<NodeStats> {
        Ok(self.lock()?.stats)
    }

    pub fn peers(&self) -> Result<Vec<NodeName>> {
        Ok(self.lock()?.peers.clone())
    }

    pub fn peer_count(&self) -> Result<usize> {
        Ok(self.lock()?.peers.len())
    }

    pub fn has_seen(&self, message_id: &str) -> Result<bool> {
        Ok(self.lock()?.received.contains(message_id))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::random::SeededRandom;

    /// Records every send instead of delivering it
    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(NodeName, NodeName, GossipMessage)>>,
    }

    impl RecordingTransport {
        fn sent(&self) -> Vec<(NodeName, NodeName, GossipMessage)> {
            self.sent.lock().unwrap().clone()
        }

        async fn wait_for(&self, count: usize) {
            tokio::time::timeout(Duration::from_secs(1), async {
                while self.sent.lock().unwrap().len() < count {
                    tokio::task::yield_now().await;
                }
            })
            .await
            .expect("sends never arrived");
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn register_node(&self, _node: &Arc<Node>) -> Result<()> {
            Ok(())
        }

        async fn send(&self, from: &NodeName, to: &NodeName, msg: GossipMessage) {
            self.sent
                .lock()
                .unwrap()
                .push((from.clone(), to.clone(), msg));
        }
    }

    fn node_with_peers(fanout: usize, peers: usize) -> (Arc<Node>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let node = Arc::new(Node::new(
            NodeName::from("node-0"),
            fanout,
            transport.clone(),
            Arc::new(SeededRandom::new(11)),
        ));
        for i in 1..=peers {
            node.add_peer(NodeName::indexed(i)).unwrap();
        }
        (node, transport)
    }

    fn payload(value: &str) -> Payload {
        let mut payload = Payload::new();
        payload.insert("message".to_string(), json!(value));
        payload
    }

    #[test]
    fn test_add_peer_idempotent() {
        let (node, _) = node_with_peers(3, 0);
        assert!(node.add_peer(NodeName::from("node-1")).unwrap());
        assert!(!node.add_peer(NodeName::from("node-1")).unwrap());
        assert!(!node.add_peer(NodeName::from("node-0")).unwrap());
        assert_eq!(node.peers().unwrap(), vec![NodeName::from("node-1")]);
    }

    #[tokio::test]
    async fn test_broadcast_ttl_zero_is_not_forwarded() {
        let (node, transport) = node_with_peers(3, 5);

        let msg = node.broadcast(payload("hello"), 0).unwrap();
        assert_eq!(msg.from, *node.id());
        assert!(node.has_seen(&msg.id).unwrap());
        assert_eq!(node.get_state().unwrap()["message"], json!("hello"));

        tokio::task::yield_now().await;
        let stats = node.get_stats().unwrap();
        assert_eq!(stats.messages_sent, 0);
        assert_eq!(stats.messages_received, 1);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_suppression() {
        let (node, transport) = node_with_peers(3, 5);
        let msg = GossipMessage::new(&NodeName::from("node-9"), 0, payload("hello"), 0);

        assert_eq!(node.receive_message(msg.clone()).unwrap(), ReceiveOutcome::Applied);
        let state_before = node.get_state().unwrap();

        assert_eq!(node.receive_message(msg).unwrap(), ReceiveOutcome::Duplicate);
        assert_eq!(node.get_state().unwrap(), state_before);

        let stats = node.get_stats().unwrap();
        assert_eq!(stats.duplicates_ignored, 1);
        assert_eq!(stats.messages_received, 2);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_is_not_reforwarded() {
        let (node, transport) = node_with_peers(2, 2);
        let msg = GossipMessage::new(&NodeName::from("node-9"), 0, payload("hello"), 4);

        assert_eq!(node.receive_message(msg.clone()).unwrap(), ReceiveOutcome::Forwarding);
        transport.wait_for(2).await;
        assert_eq!(node.receive_message(msg).unwrap(), ReceiveOutcome::Duplicate);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(transport.sent().len(), 2);
        assert_eq!(node.get_stats().unwrap().messages_sent, 2);
    }

    #[tokio::test]
    async fn test_bounded_fanout() {
        let (node, transport) = node_with_peers(3, 10);
        let msg = GossipMessage::new(&NodeName::from("outsider"), 0, payload("hello"), 5);

        assert_eq!(node.receive_message(msg.clone()).unwrap(), ReceiveOutcome::Forwarding);
        transport.wait_for(3).await;

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        let targets: HashSet<_> = sent.iter().map(|(_, to, _)| to.clone()).collect();
        assert_eq!(targets.len(), 3, "fanout targets must be distinct");

        for (from, _, forwarded) in &sent {
            assert_eq!(from, node.id());
            assert_eq!(forwarded.id, msg.id);
            assert_eq!(forwarded.from, *node.id());
            assert_eq!(forwarded.ttl, 4);
        }
        assert_eq!(node.get_stats().unwrap().messages_sent, 3);
    }

    #[tokio::test]
    async fn test_never_sends_back_to_sender() {
        let (node, transport) = node_with_peers(2, 2);
        // node-1 is a peer and the immediate sender
        let msg = GossipMessage::new(&NodeName::from("node-1"), 0, payload("hello"), 3);

        node.receive_message(msg).unwrap();
        transport.wait_for(1).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, NodeName::from("node-2"));
        assert_eq!(node.get_stats().unwrap().messages_sent, 1);
    }

    #[test]
    fn test_forwarding_without_runtime_is_rejected() {
        let (node, transport) = node_with_peers(3, 4);
        let msg = GossipMessage::new(&NodeName::from("node-9"), 0, payload("hello"), 2);

        let err = node.receive_message(msg.clone()).unwrap_err();
        assert!(matches!(err, SimError::Concurrency(_)));
        assert!(!node.has_seen(&msg.id).unwrap());
        assert!(node.get_state().unwrap().is_empty());
        assert_eq!(node.get_stats().unwrap(), NodeStats::default());

        // Nothing left to forward, so no runtime is needed
        let terminal = GossipMessage::new(&NodeName::from("node-9"), 1, payload("hello"), 0);
        assert_eq!(node.receive_message(terminal).unwrap(), ReceiveOutcome::Applied);
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_zero_fanout_is_terminal() {
        let (node, transport) = node_with_peers(0, 4);
        let msg = GossipMessage::new(&NodeName::from("node-9"), 0, payload("hello"), 7);

        assert_eq!(node.receive_message(msg).unwrap(), ReceiveOutcome::Applied);
        tokio::task::yield_now().await;
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn test_later_message_overwrites_key() {
        let (node, _) = node_with_peers(3, 0);
        let origin = NodeName::from("node-9");
        let mut second = payload("second");
        second.insert("extra".to_string(), json!(42));

        node.receive_message(GossipMessage::new(&origin, 0, payload("first"), 0))
            .unwrap();
        node.receive_message(GossipMessage::new(&origin, 1, second, 0))
            .unwrap();

        let state = node.get_state().unwrap();
        assert_eq!(state["message"], json!("second"));
        assert_eq!(state["extra"], json!(42));
    }
}

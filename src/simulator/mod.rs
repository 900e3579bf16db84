//! Gossip simulation harness
//!
//! Builds a fixed population of nodes on a shared [`MockNetwork`], peers them
//! (see [`topology`]), and exposes the driving and observation API: broadcast
//! from a named node, then check or wait for every node to agree on a key.
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info};

pub mod topology;

use crate::error::{Result, SimError};
use crate::gossip::{GossipMessage, Payload};
use crate::node::{Node, NodeName, NodeStats};
use crate::random::{RandomSource, SeededRandom, ThreadRandom};
use crate::settings::SimulationSettings;
use crate::transport::{MockNetwork, NetworkStats, Transport};

/// How many nodes agree on a key
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Convergence {
    pub converged: bool,
    pub count: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct NodeReport {
    pub id: NodeName,
    pub fanout: usize,
    pub peers: usize,
    pub stats: NodeStats,
}

/// Snapshot of a run, for logging or JSON output
#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub key: String,
    pub node_count: usize,
    pub latency_ms: u64,
    pub drop_rate: f64,
    pub convergence: Convergence,
    pub network: NetworkStats,
    pub nodes: Vec<NodeReport>,
}

impl SimulationReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct Simulator {
    settings: SimulationSettings,
    nodes: Vec<Arc<Node>>,
    network: Arc<MockNetwork>,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("settings", &self.settings)
            .field("nodes", &self.nodes.len())
            .field("network", &self.network)
            .finish()
    }
}

impl Simulator {
    pub async fn new(
        node_count: usize,
        fanout: usize,
        latency: Duration,
        drop_rate: f64,
    ) -> Result<Self> {
        Self::from_settings(SimulationSettings::new(node_count, fanout, latency, drop_rate)).await
    }

    /// Seeded settings get a reproducible random source
    pub async fn from_settings(settings: SimulationSettings) -> Result<Self> {
        let rng: Arc<dyn RandomSource> = match settings.seed {
            Some(seed) => Arc::new(SeededRandom::new(seed)),
            None => Arc::new(ThreadRandom),
        };
        Self::with_random_source(settings, rng).await
    }

    pub async fn with_random_source(
        settings: SimulationSettings,
        rng: Arc<dyn RandomSource>,
    ) -> Result<Self> {
        settings.validate()?;

        let network = Arc::new(MockNetwork::new(
            settings.latency,
            settings.drop_rate,
            Arc::clone(&rng),
        )?);
        let transport: Arc<dyn Transport> = network.clone();

        let mut nodes = Vec::with_capacity(settings.node_count);
        for i in 0..settings.node_count {
            let node = Arc::new(Node::new(
                NodeName::indexed(i),
                settings.fanout,
                Arc::clone(&transport),
                Arc::clone(&rng),
            ));
            network.register_node(&node).await?;
            nodes.push(node);
        }

        topology::build_topology(&nodes, settings.target_peer_count(), rng.as_ref())?;
        info!(
            "Simulation ready: {} nodes, fanout {}, latency {}ms, drop rate {}",
            settings.node_count,
            settings.fanout,
            settings.latency.as_millis(),
            settings.drop_rate
        );

        Ok(Self {
            settings,
            nodes,
            network,
        })
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn network(&self) -> &Arc<MockNetwork> {
        &self.network
    }

    pub fn node(&self, node_id: &str) -> Option<&Arc<Node>> {
        self.nodes.iter().find(|node| node.id().as_str() == node_id)
    }

    /// Originate `payload` at `node_id` with a hop budget of the node count.
    ///
    /// Must be called from within a tokio runtime, which runs the forwarding;
    /// otherwise this fails with [`SimError::Concurrency`] and nothing is sent.
    pub fn broadcast_from(&self, node_id: &str, payload: Payload) -> Result<GossipMessage> {
        let node = self
            .node(node_id)
            .ok_or_else(|| SimError::NodeNotFound(node_id.to_string()))?;
        let msg = node.broadcast(payload, self.settings.broadcast_ttl())?;
        info!("[{}] Broadcast {}", node_id, msg.id);
        Ok(msg)
    }

    /// Count nodes holding the same value for `key` as the first node that
    /// holds it at all. No node holding the key counts as converged.
    pub fn check_convergence(&self, key: &str) -> Result<Convergence> {
        let states = self
            .nodes
            .iter()
            .map(|node| node.get_state())
            .collect::<Result<Vec<Payload>>>()?;

        let Some(reference) = states.iter().find_map(|state| state.get(key)) else {
            return Ok(Convergence {
                converged: true,
                count: 0,
            });
        };
        let count = states
            .iter()
            .filter(|state| state.get(key) == Some(reference))
            .count();

        Ok(Convergence {
            converged: count == self.nodes.len(),
            count,
        })
    }

    /// Poll until every node agrees on `key` or `timeout` passes
    pub async fn wait_for_convergence(&self, key: &str, timeout: Duration) -> bool {
        let converged = || match self.check_convergence(key) {
            Ok(convergence) => convergence.converged,
            Err(e) => {
                error!("Failed checking convergence of '{}': {}", key, e);
                false
            }
        };

        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        let polled = tokio::time::timeout(timeout, async {
            loop {
                ticker.tick().await;
                if converged() {
                    return;
                }
            }
        })
        .await;

        polled.is_ok() || converged()
    }

    pub async fn report(&self, key: &str) -> Result<SimulationReport> {
        let nodes = self
            .nodes
            .iter()
            .map(|node| -> Result<NodeReport> {
                Ok(NodeReport {
                    id: node.id().clone(),
                    fanout: node.fanout(),
                    peers: node.peer_count()?,
                    stats: node.get_stats()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(SimulationReport {
            key: key.to_string(),
            node_count: self.nodes.len(),
            latency_ms: u64::try_from(self.network.latency().as_millis()).unwrap_or(u64::MAX),
            drop_rate: self.network.drop_rate(),
            convergence: self.check_convergence(key)?,
            network: self.network.get_stats().await,
            nodes,
        })
    }

    /// Cancel every delivery still in flight
    pub async fn shutdown(&self) {
        self.network.shutdown().await;
    }
}

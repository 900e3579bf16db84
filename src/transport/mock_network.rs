//! In-process mock network
//!
//! Delivers messages between registered nodes after a fixed latency and drops
//! a configurable fraction of them. Each pending delivery is a tracked task,
//! so [`MockNetwork::shutdown`] (or dropping the network) cancels everything
//! still in flight instead of leaking timers past the end of a run.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, trace};

use super::Transport;
use crate::error::Result;
use crate::gossip::GossipMessage;
use crate::node::{Node, NodeName};
use crate::random::RandomSource;
use crate::{config_error, transport_error};

type Registry = Arc<RwLock<HashMap<NodeName, Weak<Node>>>>;

/// One attempted delivery
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub from: NodeName,
    pub to: NodeName,
    pub message_id: String,
    pub dropped: bool,
    /// When the send happened, relative to network creation
    pub elapsed: Duration,
}

/// Aggregate counts over the message log
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    pub total: usize,
    pub dropped: usize,
}

impl NetworkStats {
    pub fn delivered(&self) -> usize {
        self.total - self.dropped
    }
}

pub struct MockNetwork {
    nodes: Registry,
    latency: Duration,
    drop_rate: f64,
    rng: Arc<dyn RandomSource>,
    // Append-only, one entry per send
    message_log: RwLock<Vec<LogEntry>>,
    in_flight: Mutex<JoinSet<()>>,
    shut_down: AtomicBool,
    started: Instant,
}

impl std::fmt::Debug for MockNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockNetwork")
            .field("latency", &self.latency)
            .field("drop_rate", &self.drop_rate)
            .finish()
    }
}

impl MockNetwork {
    pub fn new(latency: Duration, drop_rate: f64, rng: Arc<dyn RandomSource>) -> Result<Self> {
        if !(0.0..=1.0).contains(&drop_rate) {
            return Err(config_error!(
                "drop rate must be within [0, 1], got {}",
                drop_rate
            ));
        }
        Ok(Self {
            nodes: Arc::new(RwLock::new(HashMap::new())),
            latency,
            drop_rate,
            rng,
            message_log: RwLock::new(Vec::new()),
            in_flight: Mutex::new(JoinSet::new()),
            shut_down: AtomicBool::new(false),
            started: Instant::now(),
        })
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    pub fn drop_rate(&self) -> f64 {
        self.drop_rate
    }

    pub async fn get_stats(&self) -> NetworkStats {
        let log = self.message_log.read().await;
        NetworkStats {
            total: log.len(),
            dropped: log.iter().filter(|entry| entry.dropped).count(),
        }
    }

    /// Copy of every delivery attempt so far, in send order
    pub async fn message_log(&self) -> Vec<LogEntry> {
        self.message_log.read().await.clone()
    }

    /// Deliveries scheduled but not yet fired
    pub fn in_flight(&self) -> usize {
        match self.in_flight.lock() {
            Ok(mut tasks) => {
                while tasks.try_join_next().is_some() {}
                tasks.len()
            }
            Err(_) => 0,
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Cancel all pending deliveries and forget every node.
    ///
    /// Later sends are still logged but never delivered, and registering a
    /// node fails.
    pub async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        match self.in_flight.lock() {
            Ok(mut tasks) => tasks.abort_all(),
            Err(e) => error!("Failed cancelling in-flight deliveries: {}", e),
        }
        self.nodes.write().await.clear();
        debug!("Mock network shut down");
    }

    fn schedule_delivery(&self, to: NodeName, msg: GossipMessage) {
        let nodes = Arc::clone(&self.nodes);
        let latency = self.latency;
        let delivery = async move {
            tokio::time::sleep(latency).await;
            let target = nodes.read().await.get(&to).and_then(Weak::upgrade);
            match target {
                Some(node) => {
                    if let Err(e) = node.receive_message(msg) {
                        error!("[{}] Failed delivering message: {}", to, e);
                    }
                }
                None => trace!("[{}] Not registered, discarding {}", to, msg.id),
            }
        };

        match self.in_flight.lock() {
            Ok(mut tasks) => {
                // Reap finished deliveries so the set only holds pending ones
                while tasks.try_join_next().is_some() {}
                tasks.spawn(delivery);
            }
            Err(e) => error!("Failed scheduling delivery: {}", e),
        }
    }
}

#[async_trait]
impl Transport for MockNetwork {
    async fn register_node(&self, node: &Arc<Node>) -> Result<()> {
        if self.is_shut_down() {
            return Err(transport_error!(
                "cannot register {}: network is shut down",
                node.id()
            ));
        }
        let mut nodes = self.nodes.write().await;
        if nodes.contains_key(node.id()) {
            return Err(transport_error!("node {} is already registered", node.id()));
        }
        nodes.insert(node.id().clone(), Arc::downgrade(node));
        Ok(())
    }

    async fn send(&self, from: &NodeName, to: &NodeName, msg: GossipMessage) {
        let dropped = self.rng.unit_f64() < self.drop_rate;
        self.message_log.write().await.push(LogEntry {
            from: from.clone(),
            to: to.clone(),
            message_id: msg.id.clone(),
            dropped,
            elapsed: self.started.elapsed(),
        });

        if dropped {
            debug!("[{}] Dropped {} to {}", from, msg.id, to);
            return;
        }
        if self.is_shut_down() {
            trace!("[{}] Network shut down, not delivering {} to {}", from, msg.id, to);
            return;
        }
        self.schedule_delivery(to.clone(), msg);
    }
}

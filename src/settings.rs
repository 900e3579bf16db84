//! Simulation settings
use std::time::Duration;

use crate::config_error;
use crate::error::Result;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_NODE_COUNT: &str = "15";
pub const DEFAULT_FANOUT: &str = "3";
pub const DEFAULT_LATENCY_MS: &str = "10";
pub const DEFAULT_DROP_RATE: &str = "0.0";
pub const DEFAULT_POLL_INTERVAL_MS: &str = "5";

/// Floor on the number of peers each node ends up with after topology construction
pub const MIN_PEERS: usize = 3;
/// Fraction of the cluster each node is peered with
pub const PEER_RATIO: f64 = 0.4;

#[derive(Clone, Debug)]
pub struct SimulationSettings {
    // Number of nodes in the simulation
    pub node_count: usize,

    // Number of peers a node forwards to per hop
    pub fanout: usize,

    // Fixed delay applied to every simulated delivery
    pub latency: Duration,

    // Probability in [0, 1] that a send is silently dropped
    pub drop_rate: f64,

    // How often convergence is polled; shorter than a non-zero latency
    pub poll_interval: Duration,

    // Seed for reproducible runs; None draws from the thread rng
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            node_count: 15,
            fanout: 3,
            latency: Duration::from_millis(10),
            drop_rate: 0.0,
            poll_interval: Duration::from_millis(5),
            seed: None,
        }
    }
}

impl SimulationSettings {
    pub fn new(node_count: usize, fanout: usize, latency: Duration, drop_rate: f64) -> Self {
        Self {
            node_count,
            fanout,
            latency,
            drop_rate,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.node_count == 0 {
            return Err(config_error!("node count must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.drop_rate) {
            return Err(config_error!(
                "drop rate must be within [0, 1], got {}",
                self.drop_rate
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(config_error!("poll interval must be non-zero"));
        }
        // Zero latency delivers on the next scheduler turn, any interval will do
        if !self.latency.is_zero() && self.poll_interval >= self.latency {
            return Err(config_error!(
                "poll interval ({}ms) must be shorter than latency ({}ms)",
                self.poll_interval.as_millis(),
                self.latency.as_millis()
            ));
        }
        Ok(())
    }

    /// Minimum peer count each node is topped up to, capped so small clusters terminate
    pub fn target_peer_count(&self) -> usize {
        let ratio = (self.node_count as f64 * PEER_RATIO) as usize;
        MIN_PEERS
            .max(ratio)
            .min(self.node_count.saturating_sub(1))
    }

    /// Hop budget for broadcasts: enough to cross any connected topology of this size
    pub fn broadcast_ttl(&self) -> u32 {
        u32::try_from(self.node_count).unwrap_or(u32::MAX)
    }
}

//! CLI for this application
//!
use std::time::Duration;

use crate::settings;

#[derive(Clone, Debug, clap::Parser)]
#[clap(name = settings::APP_NAME, version = settings::APP_VERSION)]
pub struct Cli {
    // Population size
    #[clap(
        long,
        default_value = settings::DEFAULT_NODE_COUNT,
        env("MURMUR_NODE_COUNT"),
        help = "Number of nodes to simulate"
    )]
    pub node_count: usize,

    // Peers per forwarding hop
    #[clap(
        long,
        default_value = settings::DEFAULT_FANOUT,
        env("MURMUR_FANOUT"),
        help = "Number of peers each node forwards to per hop"
    )]
    pub fanout: usize,

    // Simulated latency
    #[clap(
        long,
        default_value = settings::DEFAULT_LATENCY_MS,
        env("MURMUR_LATENCY_MS"),
        help = "Simulated delivery latency in milliseconds"
    )]
    pub latency_ms: u64,

    // Simulated packet loss
    #[clap(
        long,
        default_value = settings::DEFAULT_DROP_RATE,
        env("MURMUR_DROP_RATE"),
        help = "Probability in [0, 1] that a send is dropped"
    )]
    pub drop_rate: f64,

    // Convergence polling
    #[clap(
        long,
        default_value = settings::DEFAULT_POLL_INTERVAL_MS,
        env("MURMUR_POLL_INTERVAL_MS"),
        help = "Convergence poll interval in milliseconds"
    )]
    pub poll_interval_ms: u64,

    // Reproducible runs
    #[clap(long, env("MURMUR_SEED"), help = "Seed for the random source")]
    pub seed: Option<u64>,

    #[clap(long, default_value = "node-0", help = "Node that originates the broadcast")]
    pub origin: String,

    #[clap(long, default_value = "message", help = "Payload key to broadcast")]
    pub key: String,

    #[clap(long, default_value = "hello", help = "Payload value to broadcast")]
    pub value: String,

    #[clap(
        long,
        default_value = "1000",
        env("MURMUR_TIMEOUT_MS"),
        help = "How long to wait for convergence in milliseconds"
    )]
    pub timeout_ms: u64,

    #[clap(long, help = "Print the final report as JSON")]
    pub json: bool,
}

impl Cli {
    pub fn into_settings(&self) -> settings::SimulationSettings {
        settings::SimulationSettings {
            node_count: self.node_count,
            fanout: self.fanout,
            latency: Duration::from_millis(self.latency_ms),
            drop_rate: self.drop_rate,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            seed: self.seed,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

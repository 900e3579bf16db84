//! Transport Module
//!
//! The [`Transport`] trait is the seam between gossip logic and message
//! delivery. [`MockNetwork`] is the in-process implementation used by the
//! simulator: fixed latency, probabilistic loss, and a full delivery log.

pub mod mock_network;
pub mod traits;

pub use mock_network::{LogEntry, MockNetwork, NetworkStats};
pub use traits::Transport;

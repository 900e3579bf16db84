//! Epidemic gossip dissemination over a fault-injecting mock network.
//!
//! A [`Simulator`](simulator::Simulator) builds a fixed population of
//! [`Node`](node::Node)s wired into a ring plus random redundant edges, all
//! talking through one [`MockNetwork`](transport::MockNetwork). A broadcast is
//! applied at its origin and then pushed hop by hop to random peers until its
//! TTL runs out; every node deduplicates on the message id so cycles in the
//! peer graph do not multiply traffic.
pub mod cli;
pub mod error;
pub mod gossip;
pub mod node;
pub mod random;
pub mod settings;
pub mod simulator;
pub mod transport;

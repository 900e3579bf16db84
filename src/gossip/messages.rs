//! Gossip Message
//!
//! Messages are serde-serializable so a real transport can put them on the
//! wire as JSON; the mock network moves them in-process without encoding.
use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::node::NodeName;

/// An update being disseminated: ordered key -> arbitrary value
pub type Payload = BTreeMap<String, serde_json::Value>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GossipMessage {
    /// Unique per broadcast and identical on every hop; the deduplication key
    pub id: String,
    pub payload: Payload,
    /// Node that most recently forwarded this message
    pub from: NodeName,
    /// Creation time at the origin. Informational only.
    pub timestamp: DateTime<Utc>,
    /// Remaining hop budget
    pub ttl: u32,
}

impl GossipMessage {
    /// Create a fresh message originating at `origin`.
    ///
    /// `sequence` disambiguates broadcasts from one origin that land on the
    /// same clock reading.
    pub fn new(origin: &NodeName, sequence: u64, payload: Payload, ttl: u32) -> Self {
        let timestamp = Utc::now();
        let nanos = timestamp
            .timestamp_nanos_opt()
            .unwrap_or_else(|| timestamp.timestamp_micros().saturating_mul(1_000));
        Self {
            id: format!("{}-{}-{}", origin, nanos, sequence),
            payload,
            from: origin.clone(),
            timestamp,
            ttl,
        }
    }

    /// The copy a node sends on: one hop spent, itself as the sender
    pub fn forwarded_by(&self, forwarder: &NodeName) -> Self {
        Self {
            id: self.id.clone(),
            payload: self.payload.clone(),
            from: forwarder.clone(),
            timestamp: self.timestamp,
            ttl: self.ttl.saturating_sub(1),
        }
    }

    /// A message with no hop budget left is applied but never forwarded
    pub fn is_exhausted(&self) -> bool {
        self.ttl == 0
    }
}

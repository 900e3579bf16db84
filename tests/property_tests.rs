use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use murmur::gossip::{GossipMessage, Payload};
use murmur::node::{Node, NodeName};
use murmur::random::{partial_shuffle, RandomSource, SeededRandom};
use murmur::settings::SimulationSettings;
use murmur::simulator::topology::{build_topology, is_connected};
use murmur::transport::MockNetwork;
use proptest::prelude::*;
use serde_json::json;

fn nodes(count: usize, seed: u64) -> (Vec<Arc<Node>>, Arc<dyn RandomSource>) {
    let rng: Arc<dyn RandomSource> = Arc::new(SeededRandom::new(seed));
    let network = Arc::new(MockNetwork::new(Duration::ZERO, 0.0, rng.clone()).unwrap());
    let nodes = (0..count)
        .map(|i| {
            Arc::new(Node::new(
                NodeName::indexed(i),
                3,
                network.clone(),
                rng.clone(),
            ))
        })
        .collect();
    (nodes, rng)
}

proptest! {
    #[test]
    fn test_topology_connected_with_minimum_degree(
        node_count in 1usize..40,
        seed in any::<u64>()
    ) {
        let settings = SimulationSettings::new(node_count, 3, Duration::from_millis(1), 0.0);
        let target = settings.target_peer_count();
        let (nodes, rng) = nodes(node_count, seed);

        build_topology(&nodes, target, rng.as_ref()).unwrap();

        prop_assert!(is_connected(&nodes).unwrap());
        for node in &nodes {
            let peers = node.peers().unwrap();
            prop_assert!(peers.len() >= target);
            prop_assert!(!peers.contains(node.id()));
            let unique: HashSet<_> = peers.iter().collect();
            prop_assert_eq!(unique.len(), peers.len());
        }
    }

    #[test]
    fn test_each_message_applied_at_most_once(
        deliveries in prop::collection::vec(0u64..8, 1..60)
    ) {
        let (nodes, _) = nodes(1, 0);
        let node = &nodes[0];
        let origin = NodeName::from("node-9");

        // ttl 0 keeps everything on this node
        for sequence in &deliveries {
            let mut payload = Payload::new();
            payload.insert("seq".to_string(), json!(sequence));
            let mut msg = GossipMessage::new(&origin, *sequence, payload, 0);
            msg.id = format!("msg-{}", sequence);
            node.receive_message(msg).unwrap();
        }

        let distinct: HashSet<_> = deliveries.iter().collect();
        let stats = node.get_stats().unwrap();
        prop_assert_eq!(stats.messages_received as usize, deliveries.len());
        prop_assert_eq!(
            stats.duplicates_ignored as usize,
            deliveries.len() - distinct.len()
        );
        for sequence in &distinct {
            let id = format!("msg-{}", sequence);
            prop_assert!(node.has_seen(&id).unwrap());
        }
    }

    #[test]
    fn test_partial_shuffle_selects_distinct(
        len in 0usize..50,
        count in 0usize..60,
        seed in any::<u64>()
    ) {
        let rng = SeededRandom::new(seed);
        let mut items: Vec<usize> = (0..len).collect();
        let picked = partial_shuffle(&rng, &mut items, count).to_vec();

        prop_assert_eq!(picked.len(), count.min(len));
        let unique: HashSet<_> = picked.iter().collect();
        prop_assert_eq!(unique.len(), picked.len());
        prop_assert!(picked.iter().all(|item| *item < len));
    }
}

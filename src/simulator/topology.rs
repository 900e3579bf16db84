//! Peer graph construction
//!
//! A ring guarantees the graph is connected; random extra edges then shorten
//! the gossip diameter and give each node some redundancy against loss.
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use tracing::trace;

use crate::error::Result;
use crate::node::{Node, NodeName};
use crate::random::RandomSource;

fn connect(a: &Node, b: &Node) -> Result<()> {
    a.add_peer(b.id().clone())?;
    b.add_peer(a.id().clone())?;
    Ok(())
}

/// Peer `nodes` into a ring, then add random bidirectional edges until every
/// node has at least `target_peers` peers.
///
/// `target_peers` must be below `nodes.len()` or this never finishes.
pub fn build_topology(
    nodes: &[Arc<Node>],
    target_peers: usize,
    rng: &dyn RandomSource,
) -> Result<()> {
    let n = nodes.len();
    if n < 2 {
        return Ok(());
    }

    for i in 0..n {
        connect(&nodes[i], &nodes[(i + 1) % n])?;
    }

    for i in 0..n {
        while nodes[i].peer_count()? < target_peers {
            let j = rng.index(n);
            if j == i {
                continue;
            }
            // add_peer ignores edges that already exist
            connect(&nodes[i], &nodes[j])?;
            trace!("Edge {} <-> {}", nodes[i].id(), nodes[j].id());
        }
    }
    Ok(())
}

/// Breadth-first check that every node is reachable from the first one
pub fn is_connected(nodes: &[Arc<Node>]) -> Result<bool> {
    let Some(first) = nodes.first() else {
        return Ok(true);
    };
    let by_name: HashMap<&NodeName, &Arc<Node>> =
        nodes.iter().map(|node| (node.id(), node)).collect();

    let mut visited = vec![first.id().clone()];
    let mut queue = VecDeque::from([Arc::clone(first)]);
    while let Some(node) = queue.pop_front() {
        for peer in node.peers()? {
            if visited.contains(&peer) {
                continue;
            }
            if let Some(next) = by_name.get(&peer) {
                queue.push_back(Arc::clone(next));
            }
            visited.push(peer);
        }
    }
    Ok(visited.len() == nodes.len())
}

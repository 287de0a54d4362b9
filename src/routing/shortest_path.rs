//! Single-source shortest path over the adjacency graph
//!
//! Dijkstra with a binary heap; weights are non-negative by construction.
//! Tie-breaking among equal-cost paths is deterministic: neighbors are
//! relaxed in lexicographic key order (the adjacency map is a `BTreeMap`),
//! the heap breaks equal-cost pops by node key, and only a strictly smaller
//! cost replaces a settled predecessor. For a fixed adjacency snapshot the
//! same route always comes out.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::model::TransferPair;
use crate::routing::graph::{AdjacencyGraph, Node};

/// A found route: the raw node walk, its total weight, and the hop sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub nodes: Vec<String>,
    pub cost: f64,
    pub pairs: Vec<TransferPair>,
}

/// Min-heap entry; ordering is reversed so the smallest cost pops first,
/// with the node key as the deterministic tie-break.
struct QueueEntry {
    cost: f64,
    node: String,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost && self.node == other.node
    }
}

impl Eq for QueueEntry {}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Weights are finite and non-negative, so partial_cmp never fails here
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Find the cheapest route between two accounts
///
/// Returns `None` when the destination account is unreachable: "no route"
/// is a business-level outcome, never an error.
pub fn find_route(
    graph: &AdjacencyGraph,
    credit_account_id: &str,
    debit_account_id: &str,
) -> Option<Route> {
    let source = crate::routing::graph::account_node(credit_account_id);
    let target = crate::routing::graph::account_node(debit_account_id);

    if !graph.contains(&source) || !graph.contains(&target) {
        return None;
    }

    let mut dist: HashMap<String, f64> = HashMap::new();
    let mut prev: HashMap<String, String> = HashMap::new();
    let mut heap = BinaryHeap::new();

    dist.insert(source.clone(), 0.0);
    heap.push(QueueEntry {
        cost: 0.0,
        node: source.clone(),
    });

    while let Some(QueueEntry { cost, node }) = heap.pop() {
        if node == target {
            break;
        }
        // Stale heap entry, already settled at a lower cost
        if cost > dist.get(&node).copied().unwrap_or(f64::INFINITY) {
            continue;
        }

        for (next, weight) in graph.neighbors(&node) {
            let candidate = cost + weight;
            let known = dist.get(next).copied().unwrap_or(f64::INFINITY);
            if candidate < known {
                dist.insert(next.to_string(), candidate);
                prev.insert(next.to_string(), node.clone());
                heap.push(QueueEntry {
                    cost: candidate,
                    node: next.to_string(),
                });
            }
        }
    }

    let cost = *dist.get(&target)?;

    // Walk predecessors back to the source
    let mut nodes = vec![target.clone()];
    let mut cursor = target;
    while cursor != source {
        cursor = prev.get(&cursor)?.clone();
        nodes.push(cursor.clone());
    }
    nodes.reverse();

    let pairs = pairs_from_nodes(&nodes)?;

    Some(Route { nodes, cost, pairs })
}

/// Window a node walk into transfer hops
///
/// The walk alternates account/address/network nodes; hops are size-5 windows
/// with stride 4, so each hop's receiving account is the next hop's sending
/// account. Returns `None` when the walk does not have hop shape (defensive,
/// treated as no-route by callers).
pub fn pairs_from_nodes(nodes: &[String]) -> Option<Vec<TransferPair>> {
    if nodes.len() < 5 || (nodes.len() - 1) % 4 != 0 {
        return None;
    }

    let mut pairs = Vec::with_capacity((nodes.len() - 1) / 4);
    for window in nodes.windows(5).step_by(4) {
        let tx_account = match Node::parse(&window[0])? {
            Node::Account(id) => id,
            _ => return None,
        };
        let (tx_network, tx_address) = match Node::parse(&window[1])? {
            Node::Address {
                network_id,
                address,
            } => (network_id, address),
            _ => return None,
        };
        let network_id = match Node::parse(&window[2])? {
            Node::Network(id) => id,
            _ => return None,
        };
        let (rx_network, rx_address) = match Node::parse(&window[3])? {
            Node::Address {
                network_id,
                address,
            } => (network_id, address),
            _ => return None,
        };
        let rx_account = match Node::parse(&window[4])? {
            Node::Account(id) => id,
            _ => return None,
        };

        // Both addresses of a hop must sit on the hop's network
        if tx_network != network_id || rx_network != network_id {
            return None;
        }

        pairs.push(TransferPair {
            tx_account_id: tx_account,
            tx_address,
            network_id,
            rx_address,
            rx_account_id: rx_account,
        });
    }

    Some(pairs)
}

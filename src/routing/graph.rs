//! Adjacency graph over accounts, addresses and networks
//!
//! Built from the full current set of address bindings and network reference
//! data. Three node namespaces keep identifiers from colliding:
//!
//! - `account_id/{account_id}`: one node per distinct account
//! - `network/{network_id}`: one node per network
//! - `address/{network_id}/{address}`: one node per (network, address) pair
//!
//! Edges are directed and weighted so that any path between two account nodes
//! alternates `account -> address -> network -> address -> account`, which is
//! exactly the shape of one transfer hop repeated end to end.

use std::collections::{BTreeMap, HashMap};

use crate::model::{AddressInfo, NetworkInfo};

/// Node key for an account
pub fn account_node(account_id: &str) -> String {
    format!("account_id/{}", account_id)
}

/// Node key for a network
pub fn network_node(network_id: &str) -> String {
    format!("network/{}", network_id)
}

/// Node key for an address, scoped per network
pub fn address_node(network_id: &str, address: &str) -> String {
    format!("address/{}/{}", network_id, address)
}

/// Kinds of graph nodes, parsed back out of a node key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Account(String),
    Network(String),
    Address { network_id: String, address: String },
}

impl Node {
    /// Parse a serialized node key back into its namespace and components
    pub fn parse(key: &str) -> Option<Node> {
        let (namespace, rest) = key.split_once('/')?;
        match namespace {
            "account_id" => Some(Node::Account(rest.to_string())),
            "network" => Some(Node::Network(rest.to_string())),
            "address" => {
                let (network_id, address) = rest.split_once('/')?;
                Some(Node::Address {
                    network_id: network_id.to_string(),
                    address: address.to_string(),
                })
            }
            _ => None,
        }
    }
}

/// Weighted directed adjacency over namespaced node keys
///
/// `BTreeMap` on both levels keeps node and neighbor iteration in
/// lexicographic key order, which is what makes shortest path tie-breaking
/// deterministic for a fixed snapshot.
#[derive(Debug, Default)]
pub struct AdjacencyGraph {
    edges: BTreeMap<String, BTreeMap<String, f64>>,
}

impl AdjacencyGraph {
    /// Build the graph from address bindings and network reference data
    ///
    /// Weights:
    /// - account <-> address: 0 (an account deposits to / withdraws from any
    ///   address it owns at no cost)
    /// - network -> address: half the network commission, splitting the fee
    ///   between the two directed traversals of a hop
    /// - address -> network: 0
    pub fn build(addresses: &[AddressInfo], networks: &[NetworkInfo]) -> Self {
        let commission_by_network: HashMap<&str, f64> = networks
            .iter()
            .map(|n| (n.network_id.as_str(), n.commission.unwrap_or(0.0) / 2.0))
            .collect();

        let mut graph = AdjacencyGraph::default();

        for info in addresses {
            let account = account_node(&info.account_id);
            let network = network_node(&info.network_id);
            let address = address_node(&info.network_id, &info.address);

            graph.add_edge(&account, &address, 0.0);
            graph.add_edge(&address, &account, 0.0);

            let half_commission = commission_by_network
                .get(info.network_id.as_str())
                .copied()
                .unwrap_or(0.0);
            graph.add_edge(&network, &address, half_commission);
            graph.add_edge(&address, &network, 0.0);
        }

        graph
    }

    fn add_edge(&mut self, from: &str, to: &str, weight: f64) {
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string(), weight);
        // Make sure the target exists even if it has no outgoing edges yet
        self.edges.entry(to.to_string()).or_default();
    }

    pub fn contains(&self, node: &str) -> bool {
        self.edges.contains_key(node)
    }

    /// Outgoing neighbors of a node, in lexicographic key order
    pub fn neighbors(&self, node: &str) -> impl Iterator<Item = (&str, f64)> {
        self.edges
            .get(node)
            .into_iter()
            .flat_map(|targets| targets.iter().map(|(k, w)| (k.as_str(), *w)))
    }

    pub fn node_count(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(account_id: &str, network_id: &str, address: &str) -> AddressInfo {
        AddressInfo {
            account_id: account_id.to_string(),
            network_id: network_id.to_string(),
            address: address.to_string(),
            currency: Some("USDT".to_string()),
        }
    }

    fn net(network_id: &str, commission: Option<f64>) -> NetworkInfo {
        NetworkInfo {
            network_id: network_id.to_string(),
            commission,
            currency: Some("USDT".to_string()),
            timeout_ms: None,
        }
    }

    #[test]
    fn test_edge_weights() {
        let graph = AdjacencyGraph::build(
            &[addr("A", "N1", "a1"), addr("B", "N1", "b1")],
            &[net("N1", Some(10.0))],
        );

        let account = account_node("A");
        let address = address_node("N1", "a1");
        let network = network_node("N1");

        let account_edges: Vec<_> = graph.neighbors(&account).collect();
        assert_eq!(account_edges, vec![(address.as_str(), 0.0)]);

        let network_edges: std::collections::HashMap<_, _> =
            graph.neighbors(&network).collect();
        // commission / 2 on the network -> address direction
        assert_eq!(network_edges[address_node("N1", "a1").as_str()], 5.0);
        assert_eq!(network_edges[address_node("N1", "b1").as_str()], 5.0);

        let address_edges: std::collections::HashMap<_, _> =
            graph.neighbors(&address).collect();
        assert_eq!(address_edges[account.as_str()], 0.0);
        assert_eq!(address_edges[network.as_str()], 0.0);
    }

    #[test]
    fn test_missing_commission_defaults_to_zero() {
        let graph = AdjacencyGraph::build(&[addr("A", "N1", "a1")], &[net("N1", None)]);
        let network = network_node("N1");
        let edges: Vec<_> = graph.neighbors(&network).collect();
        assert_eq!(edges, vec![(address_node("N1", "a1").as_str(), 0.0)]);
    }

    #[test]
    fn test_address_nodes_scoped_per_network() {
        // Same literal address string on two networks must be two nodes
        let graph = AdjacencyGraph::build(
            &[addr("A", "N1", "x"), addr("B", "N2", "x")],
            &[net("N1", Some(2.0)), net("N2", Some(4.0))],
        );
        assert!(graph.contains(&address_node("N1", "x")));
        assert!(graph.contains(&address_node("N2", "x")));
        // account A owns only the N1-scoped node
        let edges: Vec<_> = graph.neighbors(&account_node("A")).collect();
        assert_eq!(edges, vec![(address_node("N1", "x").as_str(), 0.0)]);
    }

    #[test]
    fn test_node_parse_round_trip() {
        assert_eq!(
            Node::parse(&account_node("A")),
            Some(Node::Account("A".to_string()))
        );
        assert_eq!(
            Node::parse(&network_node("N1")),
            Some(Node::Network("N1".to_string()))
        );
        assert_eq!(
            Node::parse(&address_node("N1", "a1")),
            Some(Node::Address {
                network_id: "N1".to_string(),
                address: "a1".to_string(),
            })
        );
        assert_eq!(Node::parse("bogus/x"), None);
    }
}

//! Transfer routing: adjacency graph, shortest path search and route cache

pub mod cache;
pub mod graph;
pub mod shortest_path;

pub use cache::RoutingCache;
pub use graph::AdjacencyGraph;
pub use shortest_path::find_route;

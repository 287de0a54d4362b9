//! Persistence layer: the order store seam and its PostgreSQL implementation

pub mod manager;
pub mod store;
#[cfg(test)]
pub mod testutil;

pub use manager::{OrderStats, StateManager};
pub use store::OrderStore;

//! The persistence interface the saga engine needs
//!
//! Everything the executor, dispatcher, monitor and routing cache ask of the
//! store goes through this trait. Mutations are full-row writes keyed by
//! `order_id`; cross-process races resolve to last-writer-wins, which is safe
//! because every executor invocation computes its next state from a row it
//! just read and performs at most one semantically meaningful transition.

use async_trait::async_trait;

use crate::error::TransferResult;
use crate::model::{AddressInfo, NetworkInfo, RoutingCacheEntry, TransferOrder, TransferPair};

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All orders whose status is neither COMPLETE nor ERROR
    async fn active_orders(&self) -> TransferResult<Vec<TransferOrder>>;

    /// All orders in terminal ERROR status
    async fn error_orders(&self) -> TransferResult<Vec<TransferOrder>>;

    async fn get_order(&self, order_id: &str) -> TransferResult<Option<TransferOrder>>;

    /// Full-row write keyed by `order_id` (insert or replace)
    async fn save_order(&self, order: &TransferOrder) -> TransferResult<()>;

    async fn network_info(&self, network_id: &str) -> TransferResult<Option<NetworkInfo>>;

    async fn list_network_info(&self) -> TransferResult<Vec<NetworkInfo>>;

    async fn list_address_info(&self) -> TransferResult<Vec<AddressInfo>>;

    /// Cached route for a (credit, debit) account pair, if any
    async fn cached_route(
        &self,
        credit_account_id: &str,
        debit_account_id: &str,
    ) -> TransferResult<Option<Vec<TransferPair>>>;

    /// Insert a cache entry, doing nothing if a concurrent writer got there first
    async fn insert_cached_route(&self, entry: &RoutingCacheEntry) -> TransferResult<()>;
}

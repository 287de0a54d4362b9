//! Routing cache: in-process memo plus durable write-through
//!
//! Lookup order is memo -> `transfer_routing_cache` table -> fresh graph
//! search. The cache is advisory: a failed read or write only costs a
//! recomputation, never correctness, because the order's own `routing_path`
//! column is the durable record once set.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::error::TransferResult;
use crate::model::{RoutingCacheEntry, TransferPair};
use crate::routing::graph::AdjacencyGraph;
use crate::routing::shortest_path::find_route;
use crate::state::store::OrderStore;

pub struct RoutingCache {
    store: Arc<dyn OrderStore>,
    memo: DashMap<(String, String), Vec<TransferPair>>,
}

impl RoutingCache {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            memo: DashMap::new(),
        }
    }

    /// Resolve a route for a (credit, debit) account pair
    ///
    /// Returns `Ok(None)` when no route exists, a business-level outcome the
    /// caller records on the order rather than an error.
    pub async fn resolve(
        &self,
        credit_account_id: &str,
        debit_account_id: &str,
    ) -> TransferResult<Option<Vec<TransferPair>>> {
        let key = (credit_account_id.to_string(), debit_account_id.to_string());

        if let Some(hit) = self.memo.get(&key) {
            debug!(
                credit_account_id,
                debit_account_id, "Routing memo hit"
            );
            return Ok(Some(hit.clone()));
        }

        // Durable cache read is best-effort
        match self.store.cached_route(credit_account_id, debit_account_id).await {
            Ok(Some(path)) => {
                self.memo.insert(key, path.clone());
                return Ok(Some(path));
            }
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Routing cache read failed, recomputing");
            }
        }

        let Some(path) = self.compute(credit_account_id, debit_account_id).await? else {
            return Ok(None);
        };

        // Write-through with insert-ignore semantics; a concurrent writer
        // winning the race is fine
        let entry = RoutingCacheEntry {
            credit_account_id: credit_account_id.to_string(),
            debit_account_id: debit_account_id.to_string(),
            routing_path: path.clone(),
        };
        if let Err(e) = self.store.insert_cached_route(&entry).await {
            warn!(error = %e, "Routing cache write failed, continuing");
        }

        self.memo.insert(key, path.clone());
        Ok(Some(path))
    }

    /// Fresh graph search over the current adjacency snapshot
    async fn compute(
        &self,
        credit_account_id: &str,
        debit_account_id: &str,
    ) -> TransferResult<Option<Vec<TransferPair>>> {
        let addresses = self.store.list_address_info().await?;
        let networks = self.store.list_network_info().await?;
        let graph = AdjacencyGraph::build(&addresses, &networks);

        debug!(
            credit_account_id,
            debit_account_id,
            nodes = graph.node_count(),
            "Computing route"
        );

        let started = std::time::Instant::now();
        let route = find_route(&graph, credit_account_id, debit_account_id);
        crate::metrics::record_route_computation(route.is_some(), started.elapsed().as_secs_f64());

        Ok(route.map(|r| r.pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransferError;
    use crate::model::{AddressInfo, NetworkInfo};
    use crate::state::testutil::MemoryStore;
    use async_trait::async_trait;

    fn addr(account_id: &str, network_id: &str, address: &str) -> AddressInfo {
        AddressInfo {
            account_id: account_id.to_string(),
            network_id: network_id.to_string(),
            address: address.to_string(),
            currency: None,
        }
    }

    fn net(network_id: &str, commission: Option<f64>) -> NetworkInfo {
        NetworkInfo {
            network_id: network_id.to_string(),
            commission,
            currency: None,
            timeout_ms: None,
        }
    }

    fn hop(tx: &str, txa: &str, network: &str, rxa: &str, rx: &str) -> TransferPair {
        TransferPair {
            tx_account_id: tx.to_string(),
            tx_address: txa.to_string(),
            network_id: network.to_string(),
            rx_address: rxa.to_string(),
            rx_account_id: rx.to_string(),
        }
    }

    /// Delegates to a [`MemoryStore`] but fails every route-cache operation
    struct BrokenCacheStore {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl OrderStore for BrokenCacheStore {
        async fn active_orders(&self) -> TransferResult<Vec<crate::model::TransferOrder>> {
            self.inner.active_orders().await
        }

        async fn error_orders(&self) -> TransferResult<Vec<crate::model::TransferOrder>> {
            self.inner.error_orders().await
        }

        async fn get_order(
            &self,
            order_id: &str,
        ) -> TransferResult<Option<crate::model::TransferOrder>> {
            self.inner.get_order(order_id).await
        }

        async fn save_order(&self, order: &crate::model::TransferOrder) -> TransferResult<()> {
            self.inner.save_order(order).await
        }

        async fn network_info(&self, network_id: &str) -> TransferResult<Option<NetworkInfo>> {
            self.inner.network_info(network_id).await
        }

        async fn list_network_info(&self) -> TransferResult<Vec<NetworkInfo>> {
            self.inner.list_network_info().await
        }

        async fn list_address_info(&self) -> TransferResult<Vec<AddressInfo>> {
            self.inner.list_address_info().await
        }

        async fn cached_route(
            &self,
            _credit_account_id: &str,
            _debit_account_id: &str,
        ) -> TransferResult<Option<Vec<TransferPair>>> {
            Err(TransferError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn insert_cached_route(&self, _entry: &RoutingCacheEntry) -> TransferResult<()> {
            Err(TransferError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn test_durable_table_hit_needs_no_adjacency() {
        let store = Arc::new(MemoryStore::new());
        // Seed the durable table only; with no adjacency data a fresh
        // computation would have to return None
        let path = vec![hop("A", "a1", "N1", "b1", "B")];
        store
            .insert_cached_route(&RoutingCacheEntry {
                credit_account_id: "A".to_string(),
                debit_account_id: "B".to_string(),
                routing_path: path.clone(),
            })
            .await
            .expect("seed");

        let cache = RoutingCache::new(store);
        let resolved = cache.resolve("A", "B").await.expect("resolve");
        assert_eq!(resolved, Some(path));
    }

    #[tokio::test]
    async fn test_memo_survives_table_and_adjacency_loss() {
        let store = Arc::new(MemoryStore::new());
        store.seed_addresses(vec![addr("A", "N1", "a1"), addr("B", "N1", "b1")]);
        store.seed_networks(vec![net("N1", Some(2.0))]);

        let cache = RoutingCache::new(store.clone());
        let first = cache.resolve("A", "B").await.expect("resolve");
        assert!(first.is_some());

        // With the table emptied and the adjacency gone, only the memo can
        // answer
        store.clear_cached_routes();
        store.seed_addresses(vec![]);
        let second = cache.resolve("A", "B").await.expect("resolve");
        assert_eq!(second, first);
        assert_eq!(store.cached_route_count(), 0);
    }

    #[tokio::test]
    async fn test_computed_route_written_through_once() {
        let store = Arc::new(MemoryStore::new());
        store.seed_addresses(vec![addr("A", "N1", "a1"), addr("B", "N1", "b1")]);
        store.seed_networks(vec![net("N1", Some(2.0))]);

        let cache = RoutingCache::new(store.clone());
        cache.resolve("A", "B").await.expect("resolve");
        cache.resolve("A", "B").await.expect("resolve");
        assert_eq!(store.cached_route_count(), 1);

        let persisted = store
            .cached_route("A", "B")
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(persisted, vec![hop("A", "a1", "N1", "b1", "B")]);
    }

    #[tokio::test]
    async fn test_cache_failures_degrade_to_recompute() {
        let inner = Arc::new(MemoryStore::new());
        inner.seed_addresses(vec![addr("A", "N1", "a1"), addr("B", "N1", "b1")]);
        inner.seed_networks(vec![net("N1", Some(2.0))]);

        // Read and write both fail; resolve must still produce the route
        let cache = RoutingCache::new(Arc::new(BrokenCacheStore { inner }));
        let resolved = cache.resolve("A", "B").await.expect("resolve");
        assert_eq!(resolved, Some(vec![hop("A", "a1", "N1", "b1", "B")]));
    }

    #[tokio::test]
    async fn test_no_route_is_ok_none() {
        let store = Arc::new(MemoryStore::new());
        store.seed_addresses(vec![addr("A", "N1", "a1"), addr("B", "N2", "b2")]);
        store.seed_networks(vec![net("N1", None), net("N2", None)]);

        let cache = RoutingCache::new(store.clone());
        assert_eq!(cache.resolve("A", "B").await.expect("resolve"), None);
        // A miss is never cached
        assert_eq!(store.cached_route_count(), 0);
    }
}

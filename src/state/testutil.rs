//! In-memory [`OrderStore`] for exercising the saga engine without a database

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TransferResult;
use crate::model::{
    AddressInfo, NetworkInfo, OrderStatus, RoutingCacheEntry, TransferOrder, TransferPair,
};
use crate::state::store::OrderStore;

#[derive(Default)]
pub struct MemoryStore {
    orders: Mutex<HashMap<String, TransferOrder>>,
    networks: Mutex<HashMap<String, NetworkInfo>>,
    addresses: Mutex<Vec<AddressInfo>>,
    routes: Mutex<HashMap<(String, String), Vec<TransferPair>>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_order(&self, order: TransferOrder) {
        self.orders
            .lock()
            .unwrap()
            .insert(order.order_id.clone(), order);
    }

    pub fn seed_networks(&self, networks: Vec<NetworkInfo>) {
        let mut map = self.networks.lock().unwrap();
        map.clear();
        for network in networks {
            map.insert(network.network_id.clone(), network);
        }
    }

    pub fn seed_addresses(&self, addresses: Vec<AddressInfo>) {
        *self.addresses.lock().unwrap() = addresses;
    }

    /// Number of `save_order` calls observed (for skip-write assertions)
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn cached_route_count(&self) -> usize {
        self.routes.lock().unwrap().len()
    }

    pub fn clear_cached_routes(&self) {
        self.routes.lock().unwrap().clear();
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn active_orders(&self) -> TransferResult<Vec<TransferOrder>> {
        let mut orders: Vec<_> = self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| !o.status.is_terminal())
            .cloned()
            .collect();
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(orders)
    }

    async fn error_orders(&self) -> TransferResult<Vec<TransferOrder>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .filter(|o| o.status == OrderStatus::Error)
            .cloned()
            .collect())
    }

    async fn get_order(&self, order_id: &str) -> TransferResult<Option<TransferOrder>> {
        Ok(self.orders.lock().unwrap().get(order_id).cloned())
    }

    async fn save_order(&self, order: &TransferOrder) -> TransferResult<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.orders
            .lock()
            .unwrap()
            .insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn network_info(&self, network_id: &str) -> TransferResult<Option<NetworkInfo>> {
        Ok(self.networks.lock().unwrap().get(network_id).cloned())
    }

    async fn list_network_info(&self) -> TransferResult<Vec<NetworkInfo>> {
        Ok(self.networks.lock().unwrap().values().cloned().collect())
    }

    async fn list_address_info(&self) -> TransferResult<Vec<AddressInfo>> {
        Ok(self.addresses.lock().unwrap().clone())
    }

    async fn cached_route(
        &self,
        credit_account_id: &str,
        debit_account_id: &str,
    ) -> TransferResult<Option<Vec<TransferPair>>> {
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&(credit_account_id.to_string(), debit_account_id.to_string()))
            .cloned())
    }

    async fn insert_cached_route(&self, entry: &RoutingCacheEntry) -> TransferResult<()> {
        self.routes
            .lock()
            .unwrap()
            .entry((
                entry.credit_account_id.clone(),
                entry.debit_account_id.clone(),
            ))
            .or_insert_with(|| entry.routing_path.clone());
        Ok(())
    }
}

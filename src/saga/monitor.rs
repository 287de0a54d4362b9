//! Failed-order monitoring
//!
//! Periodically counts terminal ERROR orders per account pair and publishes
//! the counts as a gauge. Alerting keys off any nonzero value, so the gauge
//! is reset before each publish to drop pairs whose failures were since
//! resolved out of band.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

use crate::error::TransferResult;
use crate::state::store::OrderStore;

pub struct FailureMonitor {
    store: Arc<dyn OrderStore>,
    interval_ms: u64,
    shutdown: Arc<RwLock<bool>>,
}

impl FailureMonitor {
    pub fn new(store: Arc<dyn OrderStore>, interval_ms: u64) -> Self {
        Self {
            store,
            interval_ms,
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn run(&self) -> TransferResult<()> {
        let mut tick = interval(Duration::from_millis(self.interval_ms));

        info!(interval_ms = self.interval_ms, "Failure monitor started");

        loop {
            if *self.shutdown.read().await {
                break;
            }

            tick.tick().await;

            if let Err(e) = self.publish_once().await {
                error!("Failure monitor sweep failed: {}", e);
            }
        }

        info!("Failure monitor stopped");
        Ok(())
    }

    /// One sweep: count ERROR orders per (debit, credit) pair and publish
    pub async fn publish_once(&self) -> TransferResult<HashMap<(String, String), u64>> {
        let failed = self.store.error_orders().await?;

        let mut counts: HashMap<(String, String), u64> = HashMap::new();
        for order in &failed {
            *counts
                .entry((
                    order.debit_account_id.clone(),
                    order.credit_account_id.clone(),
                ))
                .or_insert(0) += 1;
        }

        crate::metrics::reset_failed_transfer_orders();
        for ((debit, credit), count) in &counts {
            debug!(
                debit_account_id = %debit,
                credit_account_id = %credit,
                count,
                "Failed transfer orders"
            );
            crate::metrics::set_failed_transfer_orders(debit, credit, *count);
        }

        Ok(counts)
    }

    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
        info!("Failure monitor shutdown initiated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderStatus, TransferOrder};
    use crate::state::testutil::MemoryStore;

    fn failed_order(id: &str, credit: &str, debit: &str) -> TransferOrder {
        let mut order = TransferOrder::new(id, credit, debit, "USDT", 100.0);
        order.status = OrderStatus::Error;
        order.error_message = Some("Cannot find a routing path".to_string());
        order
    }

    #[tokio::test]
    async fn test_counts_group_by_account_pair() {
        let store = Arc::new(MemoryStore::new());
        store.seed_order(failed_order("o1", "A", "B"));
        store.seed_order(failed_order("o2", "A", "B"));
        store.seed_order(failed_order("o3", "C", "D"));
        // Non-terminal orders never count
        store.seed_order(TransferOrder::new("o4", "A", "B", "USDT", 1.0));
        let mut complete = TransferOrder::new("o5", "A", "B", "USDT", 1.0);
        complete.status = OrderStatus::Complete;
        store.seed_order(complete);

        let monitor = FailureMonitor::new(store, 1_000);
        let counts = monitor.publish_once().await.expect("sweep");

        assert_eq!(counts.len(), 2);
        assert_eq!(counts[&("B".to_string(), "A".to_string())], 2);
        assert_eq!(counts[&("D".to_string(), "C".to_string())], 1);
    }

    #[tokio::test]
    async fn test_empty_sweep_publishes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let monitor = FailureMonitor::new(store, 1_000);
        let counts = monitor.publish_once().await.expect("sweep");
        assert!(counts.is_empty());
    }
}

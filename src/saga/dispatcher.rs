//! Dispatch loop driving every active order forward
//!
//! Each tick loads all non-terminal orders and fans one executor step out per
//! order. Order failures are isolated: one order erroring never stalls the
//! rest of the batch, and a failed listing only delays the next tick.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::time::{interval, sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::config::ControllerConfig;
use crate::error::TransferResult;
use crate::saga::executor::SagaExecutor;
use crate::state::store::OrderStore;

pub struct Dispatcher {
    store: Arc<dyn OrderStore>,
    executor: Arc<SagaExecutor>,
    config: ControllerConfig,
    shutdown: Arc<RwLock<bool>>,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn OrderStore>,
        executor: Arc<SagaExecutor>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            executor,
            config,
            shutdown: Arc::new(RwLock::new(false)),
        }
    }

    /// Main dispatch loop
    pub async fn run(&self) -> TransferResult<()> {
        let mut tick = interval(Duration::from_millis(self.config.poll_interval_ms));

        info!(
            instance_id = %self.config.instance_id,
            poll_interval_ms = self.config.poll_interval_ms,
            "Dispatcher started"
        );

        loop {
            if *self.shutdown.read().await {
                break;
            }

            tick.tick().await;

            if let Err(e) = self.dispatch_once().await {
                error!("Dispatch tick failed: {}", e);
                crate::metrics::record_dispatch_failure();
                if e.is_retryable() {
                    sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }
        }

        info!("Dispatcher stopped");
        Ok(())
    }

    /// One tick: step every active order, concurrently, isolating failures
    pub async fn dispatch_once(&self) -> TransferResult<()> {
        let orders = self.store.active_orders().await?;
        crate::metrics::record_dispatch_tick(orders.len());

        if orders.is_empty() {
            return Ok(());
        }
        debug!(active = orders.len(), "Dispatching active orders");

        let steps = orders.into_iter().map(|order| {
            let executor = self.executor.clone();
            async move {
                let order_id = order.order_id.clone();
                (order_id, executor.step(order).await)
            }
        });

        for (order_id, result) in join_all(steps).await {
            match result {
                Ok(transition) => {
                    debug!(%order_id, transition = transition.kind(), "Order stepped");
                }
                Err(e) => {
                    // The order stays in its persisted state and is retried
                    // on the next tick
                    warn!(%order_id, "Order step failed: {}", e);
                }
            }
        }

        Ok(())
    }

    pub async fn stop(&self) {
        *self.shutdown.write().await = true;
        info!("Dispatcher shutdown initiated");
    }
}

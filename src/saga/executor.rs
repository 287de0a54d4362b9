//! Transfer order saga executor
//!
//! One invocation performs exactly one state transition on one order: resolve
//! the route, fail a timed-out hop, advance the hop cursor, or progress the
//! current hop's debit or credit phase. Every transition ends in a single
//! full-row write (or a deliberate skip when nothing changed), which is what
//! makes each step independently retriable and the whole saga resumable from
//! the persisted row alone after a crash.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{TransferError, TransferResult};
use crate::model::{
    OrderStatus, PhaseResult, PhaseState, TransferOrder, DEFAULT_HOP_TIMEOUT_MS,
};
use crate::routing::RoutingCache;
use crate::state::store::OrderStore;
use crate::vendor::TransferVendor;

/// The one transition an executor invocation performs
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Compute or look up the routing path (first invocation only)
    ResolveRoute,
    /// The current hop exceeded its network's allotted time
    HopTimeout {
        network_id: String,
        elapsed_ms: i64,
        timeout_ms: i64,
    },
    /// Move the cursor to the next hop, or finish the order
    Advance,
    /// Progress the debit phase via the vendor apply callback
    Apply,
    /// Progress the credit phase via the vendor eval callback
    Eval,
    /// Terminal order, nothing to do
    Noop,
}

impl Transition {
    pub fn kind(&self) -> &'static str {
        match self {
            Transition::ResolveRoute => "resolve_route",
            Transition::HopTimeout { .. } => "hop_timeout",
            Transition::Advance => "advance",
            Transition::Apply => "apply",
            Transition::Eval => "eval",
            Transition::Noop => "noop",
        }
    }
}

/// Decide the single transition for an order at `now_ms`
///
/// Pure function of the persisted row: given the same order and the same
/// clock, the same transition comes out, so re-invoking without persisting
/// anything in between is a no-op by construction.
pub fn plan(order: &TransferOrder, now_ms: i64, hop_timeout_ms: i64) -> Transition {
    if order.status.is_terminal() {
        return Transition::Noop;
    }

    if order.routing_path.is_none() {
        return Transition::ResolveRoute;
    }

    // Timeout applies only while a hop is in flight; a finished hop advances
    // no matter how long it sat there
    if let (Some(network_id), Some(started_at)) = (
        order.current_network_id.as_deref(),
        order.current_step_started_at,
    ) {
        if !order.hop_complete() {
            let elapsed_ms = now_ms - started_at;
            if elapsed_ms > hop_timeout_ms {
                return Transition::HopTimeout {
                    network_id: network_id.to_string(),
                    elapsed_ms,
                    timeout_ms: hop_timeout_ms,
                };
            }
        }
    }

    if order.current_routing_index.is_none() || order.hop_complete() {
        return Transition::Advance;
    }

    if order.current_tx_state != Some(PhaseState::Complete) {
        return Transition::Apply;
    }

    Transition::Eval
}

/// Merge a vendor apply result into the order (debit phase)
pub fn merge_apply(order: &TransferOrder, result: &PhaseResult) -> TransferOrder {
    let mut next = order.clone();
    next.current_tx_state = Some(result.state);
    if result.transaction_id.is_some() {
        next.current_transaction_id = result.transaction_id.clone();
    }
    if result.context.is_some() {
        next.current_tx_context = result.context.clone();
    }
    if result.message.is_some() {
        next.error_message = result.message.clone();
    }
    next.status = if result.state == PhaseState::Error {
        OrderStatus::Error
    } else {
        OrderStatus::Ongoing
    };
    next
}

/// Merge a vendor eval result into the order (credit phase)
pub fn merge_eval(order: &TransferOrder, result: &PhaseResult) -> TransferOrder {
    let mut next = order.clone();
    next.current_rx_state = Some(result.state);
    if result.context.is_some() {
        next.current_rx_context = result.context.clone();
    }
    if result.message.is_some() {
        next.error_message = result.message.clone();
    }
    // Prefer the vendor-reported received amount; fees and conversion happen
    // out there, not here
    if let Some(amount) = result.received_amount {
        next.current_amount = Some(amount);
    }
    next.status = if result.state == PhaseState::Error {
        OrderStatus::Error
    } else {
        OrderStatus::Ongoing
    };
    next
}

/// Drives one order through its persisted state machine, one step at a time
pub struct SagaExecutor {
    store: Arc<dyn OrderStore>,
    routing: Arc<RoutingCache>,
    vendor: Arc<dyn TransferVendor>,
}

impl SagaExecutor {
    pub fn new(
        store: Arc<dyn OrderStore>,
        routing: Arc<RoutingCache>,
        vendor: Arc<dyn TransferVendor>,
    ) -> Self {
        Self {
            store,
            routing,
            vendor,
        }
    }

    /// Perform exactly one transition for this order
    pub async fn step(&self, order: TransferOrder) -> TransferResult<Transition> {
        let now_ms = Utc::now().timestamp_millis();

        let hop_timeout_ms = match order.current_network_id.as_deref() {
            Some(network_id) => self
                .store
                .network_info(network_id)
                .await?
                .map(|n| n.hop_timeout_ms())
                .unwrap_or(DEFAULT_HOP_TIMEOUT_MS),
            None => DEFAULT_HOP_TIMEOUT_MS,
        };

        let transition = plan(&order, now_ms, hop_timeout_ms);
        match &transition {
            Transition::ResolveRoute => self.resolve_route(order).await?,
            Transition::HopTimeout {
                network_id,
                elapsed_ms,
                timeout_ms,
            } => {
                self.fail_timed_out(order, network_id, *elapsed_ms, *timeout_ms)
                    .await?
            }
            Transition::Advance => self.advance(order, now_ms).await?,
            Transition::Apply => self.apply_phase(order).await?,
            Transition::Eval => self.eval_phase(order).await?,
            Transition::Noop => {}
        }

        crate::metrics::record_transition(transition.kind());
        Ok(transition)
    }

    /// Step 1: compute or look up the routing path, once per order
    async fn resolve_route(&self, mut order: TransferOrder) -> TransferResult<()> {
        match self
            .routing
            .resolve(&order.credit_account_id, &order.debit_account_id)
            .await?
        {
            Some(path) => {
                info!(
                    order_id = %order.order_id,
                    hops = path.len(),
                    "Routing path resolved"
                );
                order.routing_path = Some(path);
                order.status = OrderStatus::Ongoing;
            }
            None => {
                warn!(
                    order_id = %order.order_id,
                    credit_account_id = %order.credit_account_id,
                    debit_account_id = %order.debit_account_id,
                    "No routing path between accounts"
                );
                order.status = OrderStatus::Error;
                order.error_message = Some("Cannot find a routing path".to_string());
                order.routing_path = None;
            }
        }
        self.persist(order).await
    }

    /// Step 2: the current hop sat in flight past its network's timeout
    async fn fail_timed_out(
        &self,
        mut order: TransferOrder,
        network_id: &str,
        elapsed_ms: i64,
        timeout_ms: i64,
    ) -> TransferResult<()> {
        let message = format!(
            "Hop {} ({} -> {} via {}) timed out after {}ms (limit {}ms)",
            order.current_routing_index.unwrap_or(-1),
            order.current_tx_account_id.as_deref().unwrap_or("?"),
            order.current_rx_account_id.as_deref().unwrap_or("?"),
            network_id,
            elapsed_ms,
            timeout_ms,
        );
        warn!(order_id = %order.order_id, %message, "Hop timeout");

        order.status = OrderStatus::Error;
        order.error_message = Some(message);
        self.persist(order).await
    }

    /// Step 3: move the cursor to the next hop, or finish the order
    async fn advance(&self, mut order: TransferOrder, now_ms: i64) -> TransferResult<()> {
        let path = order
            .routing_path
            .clone()
            .ok_or_else(|| TransferError::MalformedOrder {
                order_id: order.order_id.clone(),
                message: "advance without a routing path".to_string(),
            })?;

        let next_index = match order.current_routing_index {
            None => 0,
            Some(i) => i as usize + 1,
        };

        if next_index == path.len() {
            info!(order_id = %order.order_id, hops = path.len(), "Transfer complete");
            order.status = OrderStatus::Complete;
        } else if next_index > path.len() {
            // Should not occur: the cursor never passes the last index
            warn!(
                order_id = %order.order_id,
                next_index,
                hops = path.len(),
                "Routing index out of bounds"
            );
            order.status = OrderStatus::Error;
            order.error_message = Some(format!(
                "Routing index {} out of bounds for {} hops",
                next_index,
                path.len()
            ));
        } else {
            let hop = &path[next_index];
            info!(
                order_id = %order.order_id,
                hop = next_index,
                tx_account_id = %hop.tx_account_id,
                rx_account_id = %hop.rx_account_id,
                network_id = %hop.network_id,
                "Advancing to next hop"
            );

            order.current_routing_index = Some(next_index as i32);
            order.current_tx_account_id = Some(hop.tx_account_id.clone());
            order.current_tx_address = Some(hop.tx_address.clone());
            order.current_network_id = Some(hop.network_id.clone());
            order.current_rx_address = Some(hop.rx_address.clone());
            order.current_rx_account_id = Some(hop.rx_account_id.clone());
            order.current_tx_state = Some(PhaseState::Init);
            order.current_rx_state = Some(PhaseState::Init);
            order.current_transaction_id = None;
            order.current_tx_context = None;
            order.current_rx_context = None;
            order.current_step_started_at = Some(now_ms);
            // The first hop moves the full intended amount; later hops carry
            // whatever the previous hop actually delivered
            if order.current_amount.is_none() {
                order.current_amount = Some(order.expected_amount);
            }
        }

        self.persist(order).await
    }

    /// Step 4: progress the debit phase
    async fn apply_phase(&self, order: TransferOrder) -> TransferResult<()> {
        let result = self.vendor.apply(&order).await?;
        debug!(
            order_id = %order.order_id,
            state = %result.state,
            "Vendor apply result"
        );

        let merged = merge_apply(&order, &result);
        if merged.same_persisted_state(&order) {
            debug!(order_id = %order.order_id, "Apply produced no change, skipping write");
            return Ok(());
        }
        self.persist(merged).await
    }

    /// Step 5: progress the credit phase
    async fn eval_phase(&self, order: TransferOrder) -> TransferResult<()> {
        let result = self.vendor.eval(&order).await?;
        debug!(
            order_id = %order.order_id,
            state = %result.state,
            "Vendor eval result"
        );

        let merged = merge_eval(&order, &result);
        if merged.same_persisted_state(&order) {
            debug!(order_id = %order.order_id, "Eval produced no change, skipping write");
            return Ok(());
        }
        self.persist(merged).await
    }

    async fn persist(&self, mut order: TransferOrder) -> TransferResult<()> {
        order.updated_at = Utc::now();
        self.store.save_order(&order).await
    }
}

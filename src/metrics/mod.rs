//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Failed transfer orders per account pair (the primary alerting signal)
//! - Saga transitions by kind
//! - Dispatch loop activity and errors
//! - Database health checks

use crate::error::TransferResult;

use axum::{routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Alerting metric: any nonzero series means manual attention is needed
    pub static ref FAILED_TRANSFER_ORDERS: GaugeVec = register_gauge_vec!(
        "failed_transfer_orders",
        "Transfer orders in terminal ERROR status per account pair",
        &["debit_account_id", "credit_account_id"]
    ).unwrap();

    // Saga metrics
    pub static ref SAGA_TRANSITIONS: CounterVec = register_counter_vec!(
        "transfer_saga_transitions_total",
        "Total saga transitions performed by kind",
        &["transition"]
    ).unwrap();

    // Dispatch metrics
    pub static ref DISPATCH_TICKS: CounterVec = register_counter_vec!(
        "transfer_dispatch_ticks_total",
        "Total dispatch loop ticks",
        &[]
    ).unwrap();

    pub static ref DISPATCH_ACTIVE_ORDERS: GaugeVec = register_gauge_vec!(
        "transfer_dispatch_active_orders",
        "Active orders seen by the last dispatch tick",
        &[]
    ).unwrap();

    pub static ref DISPATCH_FAILURES: CounterVec = register_counter_vec!(
        "transfer_dispatch_failures_total",
        "Total dispatch ticks that failed to list or step orders",
        &[]
    ).unwrap();

    // Routing metrics
    pub static ref ROUTE_COMPUTATIONS: CounterVec = register_counter_vec!(
        "transfer_route_computations_total",
        "Total shortest-path computations by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref ROUTE_COMPUTATION_SECONDS: HistogramVec = register_histogram_vec!(
        "transfer_route_computation_seconds",
        "Shortest-path computation latency",
        &[],
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();

    // Health metrics
    pub static ref HEALTH_CHECK_SUCCESS: CounterVec = register_counter_vec!(
        "transfer_health_check_success_total",
        "Total successful database health checks",
        &[]
    ).unwrap();

    pub static ref HEALTH_CHECK_FAILURE: CounterVec = register_counter_vec!(
        "transfer_health_check_failure_total",
        "Total failed database health checks",
        &[]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> TransferResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::error::TransferError::Internal(e.to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| crate::error::TransferError::Internal(e.to_string()))?;

        Ok(())
    }
}

async fn metrics_handler() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

// Helper functions to record metrics

pub fn set_failed_transfer_orders(debit_account_id: &str, credit_account_id: &str, count: u64) {
    FAILED_TRANSFER_ORDERS
        .with_label_values(&[debit_account_id, credit_account_id])
        .set(count as f64);
}

/// Drop all per-pair series so resolved pairs stop reporting stale counts
pub fn reset_failed_transfer_orders() {
    FAILED_TRANSFER_ORDERS.reset();
}

pub fn record_transition(kind: &str) {
    SAGA_TRANSITIONS.with_label_values(&[kind]).inc();
}

pub fn record_dispatch_tick(active_orders: usize) {
    DISPATCH_TICKS.with_label_values(&[]).inc();
    DISPATCH_ACTIVE_ORDERS
        .with_label_values(&[])
        .set(active_orders as f64);
}

pub fn record_dispatch_failure() {
    DISPATCH_FAILURES.with_label_values(&[]).inc();
}

pub fn record_route_computation(found: bool, elapsed_secs: f64) {
    let outcome = if found { "found" } else { "no_route" };
    ROUTE_COMPUTATIONS.with_label_values(&[outcome]).inc();
    ROUTE_COMPUTATION_SECONDS
        .with_label_values(&[])
        .observe(elapsed_secs);
}

pub fn record_health_check() {
    HEALTH_CHECK_SUCCESS.with_label_values(&[]).inc();
}

pub fn record_health_check_failure() {
    HEALTH_CHECK_FAILURE.with_label_values(&[]).inc();
}

//! Core data model: transfer orders, routing hops and reference data
//!
//! A transfer order is the aggregate root. Its intent fields are written once
//! at creation; the routing path is written once by the saga executor; the
//! `current_*` cursor fields are rewritten one field-set per executor
//! invocation. The persisted row is the single source of truth for recovery.

use serde::{Deserialize, Serialize};

/// Hop timeout applied when a network carries no explicit timeout
pub const DEFAULT_HOP_TIMEOUT_MS: i64 = 300_000;

/// Lifecycle status of a transfer order
///
/// Monotonic: `Init -> Ongoing -> {Complete, Error}`. Nothing ever leaves a
/// terminal state; failed orders require external re-submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Init,
    Ongoing,
    Complete,
    Error,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Init => "INIT",
            OrderStatus::Ongoing => "ONGOING",
            OrderStatus::Complete => "COMPLETE",
            OrderStatus::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INIT" => Some(OrderStatus::Init),
            "ONGOING" => Some(OrderStatus::Ongoing),
            "COMPLETE" => Some(OrderStatus::Complete),
            "ERROR" => Some(OrderStatus::Error),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Complete | OrderStatus::Error)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one phase (debit or credit) of the current hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseState {
    Init,
    Pending,
    Complete,
    Error,
}

impl PhaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseState::Init => "INIT",
            PhaseState::Pending => "PENDING",
            PhaseState::Complete => "COMPLETE",
            PhaseState::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INIT" => Some(PhaseState::Init),
            "PENDING" => Some(PhaseState::Pending),
            "COMPLETE" => Some(PhaseState::Complete),
            "ERROR" => Some(PhaseState::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for PhaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One elementary transfer leg: debit `tx_address` on `network_id` from
/// `tx_account_id`, credit `rx_address` on the same network to `rx_account_id`.
///
/// Immutable once computed; a route is an ordered list of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPair {
    pub tx_account_id: String,
    pub tx_address: String,
    pub network_id: String,
    pub rx_address: String,
    pub rx_account_id: String,
}

/// The persisted transfer order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferOrder {
    pub order_id: String,

    // Intent, set once at creation
    pub credit_account_id: String,
    pub debit_account_id: String,
    pub currency: String,
    pub expected_amount: f64,

    pub status: OrderStatus,
    pub error_message: Option<String>,

    /// Computed route; immutable for the life of the order once set.
    /// A crash mid-route must resume along the same path.
    pub routing_path: Option<Vec<TransferPair>>,
    /// Index into `routing_path`; `None` means "not yet started"
    pub current_routing_index: Option<i32>,

    // Per-hop execution cursor, copied from the hop at the current index
    pub current_tx_account_id: Option<String>,
    pub current_rx_account_id: Option<String>,
    pub current_tx_address: Option<String>,
    pub current_rx_address: Option<String>,
    pub current_network_id: Option<String>,
    pub current_tx_state: Option<PhaseState>,
    pub current_transaction_id: Option<String>,
    pub current_tx_context: Option<String>,
    pub current_rx_state: Option<PhaseState>,
    pub current_rx_context: Option<String>,
    /// Epoch milliseconds, reset every time the cursor advances
    pub current_step_started_at: Option<i64>,
    /// Amount carried by the current hop; mutates as conversion/fees are observed
    pub current_amount: Option<f64>,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransferOrder {
    /// Create a fresh order with intent fields only, as an external caller would
    pub fn new(
        order_id: impl Into<String>,
        credit_account_id: impl Into<String>,
        debit_account_id: impl Into<String>,
        currency: impl Into<String>,
        expected_amount: f64,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            order_id: order_id.into(),
            credit_account_id: credit_account_id.into(),
            debit_account_id: debit_account_id.into(),
            currency: currency.into(),
            expected_amount,
            status: OrderStatus::Init,
            error_message: None,
            routing_path: None,
            current_routing_index: None,
            current_tx_account_id: None,
            current_rx_account_id: None,
            current_tx_address: None,
            current_rx_address: None,
            current_network_id: None,
            current_tx_state: None,
            current_transaction_id: None,
            current_tx_context: None,
            current_rx_state: None,
            current_rx_context: None,
            current_step_started_at: None,
            current_amount: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Compare persisted state ignoring `updated_at`
    ///
    /// Used by the executor to skip writes that would only refresh the update
    /// timestamp while the vendor side is still pending with no new
    /// information.
    pub fn same_persisted_state(&self, other: &Self) -> bool {
        let mut a = self.clone();
        a.updated_at = other.updated_at;
        a == *other
    }

    /// Both phases of the current hop finished successfully
    pub fn hop_complete(&self) -> bool {
        self.current_tx_state == Some(PhaseState::Complete)
            && self.current_rx_state == Some(PhaseState::Complete)
    }
}

/// Per-network commission and timeout reference data (externally owned)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub network_id: String,
    pub commission: Option<f64>,
    pub currency: Option<String>,
    pub timeout_ms: Option<i64>,
}

impl NetworkInfo {
    /// Timeout for hops over this network, falling back to the default
    pub fn hop_timeout_ms(&self) -> i64 {
        self.timeout_ms.unwrap_or(DEFAULT_HOP_TIMEOUT_MS)
    }
}

/// An (account, network, address) binding: the raw adjacency input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    pub account_id: String,
    pub network_id: String,
    pub address: String,
    pub currency: Option<String>,
}

/// Cached route for a (credit, debit) account pair
///
/// Advisory only: written with insert-ignore semantics and safe to be stale
/// or absent. The order's own `routing_path` is the durable record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingCacheEntry {
    pub credit_account_id: String,
    pub debit_account_id: String,
    pub routing_path: Vec<TransferPair>,
}

/// Result reported by a vendor apply/eval callback
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseResult {
    pub state: PhaseState,
    pub message: Option<String>,
    pub transaction_id: Option<String>,
    pub context: Option<String>,
    pub received_amount: Option<f64>,
}

impl PhaseResult {
    pub fn pending() -> Self {
        Self {
            state: PhaseState::Pending,
            message: None,
            transaction_id: None,
            context: None,
            received_amount: None,
        }
    }

    pub fn complete() -> Self {
        Self {
            state: PhaseState::Complete,
            message: None,
            transaction_id: None,
            context: None,
            received_amount: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            state: PhaseState::Error,
            message: Some(message.into()),
            transaction_id: None,
            context: None,
            received_amount: None,
        }
    }
}

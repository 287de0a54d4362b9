//! PostgreSQL state manager

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::error::{TransferError, TransferResult};
use crate::model::{
    AddressInfo, NetworkInfo, OrderStatus, PhaseState, RoutingCacheEntry, TransferOrder,
    TransferPair,
};
use crate::state::store::OrderStore;

/// State manager for PostgreSQL persistence
pub struct StateManager {
    pool: PgPool,
}

impl StateManager {
    /// Create a new state manager
    pub async fn new(config: &DatabaseConfig) -> TransferResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await
            .map_err(TransferError::Database)?;

        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by DB-backed tests)
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> TransferResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transfer_order (
                order_id TEXT PRIMARY KEY,
                credit_account_id TEXT NOT NULL,
                debit_account_id TEXT NOT NULL,
                currency TEXT NOT NULL,
                expected_amount DOUBLE PRECISION NOT NULL,
                status TEXT NOT NULL,
                error_message TEXT,
                routing_path JSONB,
                current_routing_index INTEGER,
                current_tx_account_id TEXT,
                current_rx_account_id TEXT,
                current_tx_address TEXT,
                current_rx_address TEXT,
                current_network_id TEXT,
                current_tx_state TEXT,
                current_transaction_id TEXT,
                current_tx_context TEXT,
                current_rx_state TEXT,
                current_rx_context TEXT,
                current_step_started_at BIGINT,
                current_amount DOUBLE PRECISION,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_transfer_order_status
            ON transfer_order (status)
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transfer_network_info (
                network_id TEXT PRIMARY KEY,
                commission DOUBLE PRECISION,
                currency TEXT,
                timeout BIGINT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS transfer_routing_cache (
                credit_account_id TEXT NOT NULL,
                debit_account_id TEXT NOT NULL,
                routing_path JSONB NOT NULL,
                PRIMARY KEY (credit_account_id, debit_account_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS account_address_info (
                account_id TEXT NOT NULL,
                network_id TEXT NOT NULL,
                address TEXT NOT NULL,
                currency TEXT,
                PRIMARY KEY (account_id, network_id, address)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Database migrations complete");
        Ok(())
    }

    /// Health check
    pub async fn health_check(&self) -> TransferResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(TransferError::Database)?;
        Ok(())
    }

    /// Order counts by status, for the status API
    pub async fn order_stats(&self) -> TransferResult<OrderStats> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'INIT') as init,
                COUNT(*) FILTER (WHERE status = 'ONGOING') as ongoing,
                COUNT(*) FILTER (WHERE status = 'COMPLETE') as complete,
                COUNT(*) FILTER (WHERE status = 'ERROR') as error
            FROM transfer_order
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(OrderStats {
            init: row.get::<i64, _>("init") as u64,
            ongoing: row.get::<i64, _>("ongoing") as u64,
            complete: row.get::<i64, _>("complete") as u64,
            error: row.get::<i64, _>("error") as u64,
        })
    }

    fn order_from_row(row: &PgRow) -> TransferResult<TransferOrder> {
        let order_id: String = row.get("order_id");

        let status_str: String = row.get("status");
        let status = OrderStatus::parse(&status_str).ok_or_else(|| {
            TransferError::MalformedOrder {
                order_id: order_id.clone(),
                message: format!("unknown status {:?}", status_str),
            }
        })?;

        let parse_phase = |column: &str| -> TransferResult<Option<PhaseState>> {
            let raw: Option<String> = row.get(column);
            match raw {
                None => Ok(None),
                Some(s) => PhaseState::parse(&s).map(Some).ok_or_else(|| {
                    TransferError::MalformedOrder {
                        order_id: order_id.clone(),
                        message: format!("unknown {} {:?}", column, s),
                    }
                }),
            }
        };

        let routing_path: Option<serde_json::Value> = row.get("routing_path");
        let routing_path: Option<Vec<TransferPair>> = match routing_path {
            None => None,
            Some(value) => Some(serde_json::from_value(value).map_err(|e| {
                TransferError::MalformedOrder {
                    order_id: order_id.clone(),
                    message: format!("bad routing_path: {}", e),
                }
            })?),
        };

        Ok(TransferOrder {
            order_id: order_id.clone(),
            credit_account_id: row.get("credit_account_id"),
            debit_account_id: row.get("debit_account_id"),
            currency: row.get("currency"),
            expected_amount: row.get("expected_amount"),
            status,
            error_message: row.get("error_message"),
            routing_path,
            current_routing_index: row.get("current_routing_index"),
            current_tx_account_id: row.get("current_tx_account_id"),
            current_rx_account_id: row.get("current_rx_account_id"),
            current_tx_address: row.get("current_tx_address"),
            current_rx_address: row.get("current_rx_address"),
            current_network_id: row.get("current_network_id"),
            current_tx_state: parse_phase("current_tx_state")?,
            current_transaction_id: row.get("current_transaction_id"),
            current_tx_context: row.get("current_tx_context"),
            current_rx_state: parse_phase("current_rx_state")?,
            current_rx_context: row.get("current_rx_context"),
            current_step_started_at: row.get("current_step_started_at"),
            current_amount: row.get("current_amount"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }

    fn routing_path_json(order: &TransferOrder) -> TransferResult<Option<serde_json::Value>> {
        order
            .routing_path
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| TransferError::Internal(format!("encode routing_path: {}", e)))
    }
}

#[async_trait]
impl OrderStore for StateManager {
    async fn active_orders(&self) -> TransferResult<Vec<TransferOrder>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM transfer_order
            WHERE status NOT IN ('ERROR', 'COMPLETE')
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::order_from_row).collect()
    }

    async fn error_orders(&self) -> TransferResult<Vec<TransferOrder>> {
        let rows = sqlx::query("SELECT * FROM transfer_order WHERE status = 'ERROR'")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::order_from_row).collect()
    }

    async fn get_order(&self, order_id: &str) -> TransferResult<Option<TransferOrder>> {
        let row = sqlx::query("SELECT * FROM transfer_order WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::order_from_row).transpose()
    }

    async fn save_order(&self, order: &TransferOrder) -> TransferResult<()> {
        let routing_path = Self::routing_path_json(order)?;

        sqlx::query(
            r#"
            INSERT INTO transfer_order (
                order_id, credit_account_id, debit_account_id, currency,
                expected_amount, status, error_message, routing_path,
                current_routing_index, current_tx_account_id, current_rx_account_id,
                current_tx_address, current_rx_address, current_network_id,
                current_tx_state, current_transaction_id, current_tx_context,
                current_rx_state, current_rx_context, current_step_started_at,
                current_amount, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                    $15, $16, $17, $18, $19, $20, $21, $22, $23)
            ON CONFLICT (order_id) DO UPDATE SET
                status = EXCLUDED.status,
                error_message = EXCLUDED.error_message,
                routing_path = EXCLUDED.routing_path,
                current_routing_index = EXCLUDED.current_routing_index,
                current_tx_account_id = EXCLUDED.current_tx_account_id,
                current_rx_account_id = EXCLUDED.current_rx_account_id,
                current_tx_address = EXCLUDED.current_tx_address,
                current_rx_address = EXCLUDED.current_rx_address,
                current_network_id = EXCLUDED.current_network_id,
                current_tx_state = EXCLUDED.current_tx_state,
                current_transaction_id = EXCLUDED.current_transaction_id,
                current_tx_context = EXCLUDED.current_tx_context,
                current_rx_state = EXCLUDED.current_rx_state,
                current_rx_context = EXCLUDED.current_rx_context,
                current_step_started_at = EXCLUDED.current_step_started_at,
                current_amount = EXCLUDED.current_amount,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&order.order_id)
        .bind(&order.credit_account_id)
        .bind(&order.debit_account_id)
        .bind(&order.currency)
        .bind(order.expected_amount)
        .bind(order.status.as_str())
        .bind(&order.error_message)
        .bind(routing_path)
        .bind(order.current_routing_index)
        .bind(&order.current_tx_account_id)
        .bind(&order.current_rx_account_id)
        .bind(&order.current_tx_address)
        .bind(&order.current_rx_address)
        .bind(&order.current_network_id)
        .bind(order.current_tx_state.map(|s| s.as_str()))
        .bind(&order.current_transaction_id)
        .bind(&order.current_tx_context)
        .bind(order.current_rx_state.map(|s| s.as_str()))
        .bind(&order.current_rx_context)
        .bind(order.current_step_started_at)
        .bind(order.current_amount)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        debug!(order_id = %order.order_id, status = %order.status, "Saved order");
        Ok(())
    }

    async fn network_info(&self, network_id: &str) -> TransferResult<Option<NetworkInfo>> {
        let row = sqlx::query(
            "SELECT network_id, commission, currency, timeout FROM transfer_network_info WHERE network_id = $1",
        )
        .bind(network_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| NetworkInfo {
            network_id: r.get("network_id"),
            commission: r.get("commission"),
            currency: r.get("currency"),
            timeout_ms: r.get("timeout"),
        }))
    }

    async fn list_network_info(&self) -> TransferResult<Vec<NetworkInfo>> {
        let rows =
            sqlx::query("SELECT network_id, commission, currency, timeout FROM transfer_network_info")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|r| NetworkInfo {
                network_id: r.get("network_id"),
                commission: r.get("commission"),
                currency: r.get("currency"),
                timeout_ms: r.get("timeout"),
            })
            .collect())
    }

    async fn list_address_info(&self) -> TransferResult<Vec<AddressInfo>> {
        let rows = sqlx::query(
            "SELECT account_id, network_id, address, currency FROM account_address_info",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| AddressInfo {
                account_id: r.get("account_id"),
                network_id: r.get("network_id"),
                address: r.get("address"),
                currency: r.get("currency"),
            })
            .collect())
    }

    async fn cached_route(
        &self,
        credit_account_id: &str,
        debit_account_id: &str,
    ) -> TransferResult<Option<Vec<TransferPair>>> {
        let row = sqlx::query(
            r#"
            SELECT routing_path FROM transfer_routing_cache
            WHERE credit_account_id = $1 AND debit_account_id = $2
            "#,
        )
        .bind(credit_account_id)
        .bind(debit_account_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            None => Ok(None),
            Some(r) => {
                let value: serde_json::Value = r.get("routing_path");
                serde_json::from_value(value)
                    .map(Some)
                    .map_err(|e| TransferError::Internal(format!("bad cached route: {}", e)))
            }
        }
    }

    async fn insert_cached_route(&self, entry: &RoutingCacheEntry) -> TransferResult<()> {
        let routing_path = serde_json::to_value(&entry.routing_path)
            .map_err(|e| TransferError::Internal(format!("encode cached route: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO transfer_routing_cache (credit_account_id, debit_account_id, routing_path)
            VALUES ($1, $2, $3)
            ON CONFLICT (credit_account_id, debit_account_id) DO NOTHING
            "#,
        )
        .bind(&entry.credit_account_id)
        .bind(&entry.debit_account_id)
        .bind(routing_path)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// Order counts by status
#[derive(Debug, Clone)]
pub struct OrderStats {
    pub init: u64,
    pub ongoing: u64,
    pub complete: u64,
    pub error: u64,
}

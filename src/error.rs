//! Error types for the Transfer Controller
//!
//! Deliberately small: routing, timeout and vendor failures are business
//! outcomes written into the order's `status`/`error_message`, never raised
//! as process errors. What remains here is infrastructure and data integrity.

use thiserror::Error;

/// Main error type for the transfer controller
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Malformed order {order_id}: {message}")]
    MalformedOrder { order_id: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TransferError {
    /// Check if error is retryable
    ///
    /// Retryable errors are infrastructure failures that are never attributed
    /// to a specific order; the dispatcher retries them on the next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransferError::Database(_))
    }
}

/// Result type for transfer controller operations
pub type TransferResult<T> = Result<T, TransferError>;

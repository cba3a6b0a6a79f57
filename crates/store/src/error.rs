use common::{CartLineId, ProductId};
use thiserror::Error;

use crate::store::AdjustmentValidationError;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The row guarded by a compare-and-swap changed since it was read.
    #[error("Concurrency conflict on {entity} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: i64,
        actual: i64,
    },

    /// A referenced row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A stock decrement would take a product below zero under the reject policy.
    #[error("Insufficient stock for product {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        available: i64,
        requested: i64,
    },

    /// The requested stock adjustments are malformed.
    #[error(transparent)]
    InvalidAdjustment(#[from] AdjustmentValidationError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A cart line quantity cannot be persisted.
    #[error("Invalid quantity {quantity} on cart line {line_id}")]
    InvalidQuantity { line_id: CartLineId, quantity: u32 },
}

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(entity: &'static str, id: impl ToString, expected: i64, actual: i64) -> Self {
        let id = id.to_string();
        tracing::debug!(entity, %id, expected, actual, "version check failed");
        metrics::counter!("store_conflicts_total", "entity" => entity).increment(1);
        StoreError::ConcurrencyConflict {
            entity,
            id,
            expected,
            actual,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

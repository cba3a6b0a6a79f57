//! Domain error types.

use common::{CartToken, OrderId};
use store::StoreError;
use thiserror::Error;

use crate::order::{OrderStatus, SnapshotError};
use crate::value_objects::AmountOverflow;

/// Coarse classification of a [`DomainError`], used by callers to pick a
/// response without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or out-of-range input.
    Validation,
    /// A cart, order, or catalog row is missing.
    NotFound,
    /// A stored snapshot failed schema validation.
    Parse,
    /// The request conflicts with the current state.
    Conflict,
    /// Constraint or transaction failure in the store.
    Database,
}

impl ErrorKind {
    /// Returns the kind as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Parse => "parse",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Database => "database",
        }
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No cart exists for the token.
    #[error("cart not found: {0}")]
    CartNotFound(CartToken),

    /// The cart has no lines or a zero total.
    #[error("cart is empty")]
    EmptyCart,

    /// No identity could be resolved for the caller.
    #[error("authentication required")]
    Unauthenticated,

    /// No order exists for the id.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// The cart has no line with the id.
    #[error("cart line not found: {0}")]
    CartLineNotFound(common::CartLineId),

    /// A referenced variant, additional, or product does not exist.
    #[error("{kind} not found: {id}")]
    CatalogItemNotFound { kind: &'static str, id: i64 },

    /// The transition table does not allow the move.
    #[error("cannot change order status from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The stored snapshot could not be read while fulfilling an order.
    #[error("order {order_id} has an unreadable snapshot: {source}")]
    SnapshotUnparseable {
        order_id: OrderId,
        #[source]
        source: SnapshotError,
    },

    /// A stored or requested status name is not recognized.
    #[error("unknown order status: {0}")]
    UnknownStatus(String),

    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// A price computation overflowed.
    #[error("cart total is too large: {0}")]
    AmountOverflow(#[from] AmountOverflow),

    /// A concurrent writer won the race.
    #[error("{0}")]
    Conflict(String),

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::EmptyCart
            | DomainError::Unauthenticated
            | DomainError::UnknownStatus(_)
            | DomainError::Validation(_)
            | DomainError::AmountOverflow(_) => ErrorKind::Validation,
            DomainError::CartNotFound(_)
            | DomainError::OrderNotFound(_)
            | DomainError::CartLineNotFound(_)
            | DomainError::CatalogItemNotFound { .. } => ErrorKind::NotFound,
            DomainError::SnapshotUnparseable { .. } => ErrorKind::Parse,
            DomainError::InvalidTransition { .. } | DomainError::Conflict(_) => {
                ErrorKind::Conflict
            }
            DomainError::Store(e) => match e {
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::ConcurrencyConflict { .. } | StoreError::InsufficientStock { .. } => {
                    ErrorKind::Conflict
                }
                StoreError::InvalidAdjustment(_) | StoreError::InvalidQuantity { .. } => {
                    ErrorKind::Validation
                }
                StoreError::Database(_) | StoreError::Migration(_) => ErrorKind::Database,
            },
            DomainError::Serialization(_) => ErrorKind::Database,
        }
    }
}

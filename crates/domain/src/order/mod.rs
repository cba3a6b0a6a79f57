//! Order aggregate, snapshot, status machine, and services.

mod aggregate;
mod checkout;
mod inventory;
mod service;
mod snapshot;
mod status;

pub use aggregate::Order;
pub use checkout::{CheckoutService, DEFAULT_NOTIFY_TIMEOUT};
pub use inventory::plan_adjustments;
pub use service::{MAX_TRANSITION_ATTEMPTS, OrderService, StatusUpdate};
pub use snapshot::{
    FrozenAdditional, FrozenLineItem, FrozenProduct, FrozenVariant, OrderSnapshot,
    SCHEMA_VERSION, SnapshotError, ValidatedLine,
};
pub use status::{OrderStatus, SideEffect, Transition};

//! Domain layer for the storefront order core.
//!
//! This crate provides:
//! - `Money` and the Cart Pricing Calculator shared by carts, checkout, and reports
//! - Cart aggregate and `CartService`
//! - Order snapshot serialization, the explicit status transition table, and
//!   inventory adjustment planning
//! - `CheckoutService` (`createOrder`) and `OrderService` (`updateOrderStatus`)
//! - Collaborator seams for identity resolution and order notification

pub mod cart;
pub mod catalog;
pub mod collaborators;
pub mod error;
pub mod order;
pub mod pricing;
pub mod value_objects;

pub use cart::{Cart, CartService, MAX_LINE_QUANTITY};
pub use catalog::{AdditionalView, ProductView, ResolvedCart, ResolvedLine, VariantView};
pub use collaborators::{
    IdentityResolver, InMemorySessions, LogNotifier, NotificationError, OrderNotifier,
    RecordingNotifier,
};
pub use error::{DomainError, ErrorKind};
pub use order::{
    CheckoutService, Order, OrderService, OrderSnapshot, OrderStatus, SnapshotError, StatusUpdate,
    Transition, ValidatedLine,
};
pub use pricing::PricedLine;
pub use value_objects::{AmountOverflow, CustomerInfo, Money};

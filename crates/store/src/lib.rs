//! Persistence for the storefront order core.
//!
//! The [`Store`] trait is the unit-of-work boundary handed to every service
//! call. Mutations that must be atomic (checkout, fulfillment) are single
//! compare-and-swap operations on the trait rather than separate read and
//! write calls.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod records;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::OrderQuery;
pub use records::{
    AdditionalRecord, CartLineRecord, CartRecord, OrderRecord, ProductRecord, StatusChange,
    StockAdjustment, StockPolicy, VariantRecord,
};
pub use store::{OrderStream, Store, StoreExt};

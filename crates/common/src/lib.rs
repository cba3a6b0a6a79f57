//! Identifier types shared by every crate of the storefront order core.

mod types;

pub use types::{AdditionalId, CartLineId, CartToken, OrderId, ProductId, UserId, VariantId};

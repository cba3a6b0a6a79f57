//! HTTP handlers.
//!
//! Every JSON response carries `success`; failures add a `message` (see
//! [`crate::error::ApiError`]).

pub mod carts;
pub mod orders;
pub mod reports;
pub mod system;

//! Shopping cart aggregate and service.

mod aggregate;
mod service;

pub use aggregate::{Cart, MAX_LINE_QUANTITY};
pub use service::CartService;

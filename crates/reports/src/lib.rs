//! Reports over the order history.
//!
//! Nothing is materialized: every report replays stored order snapshots (or,
//! for stock, reads current product rows) at request time.
//! - [`ReportEngine`] generates sales, rating, and stock reports
//! - [`ReportRange`] turns calendar dates into an inclusive UTC window
//! - [`SalesAccumulator`] folds snapshot lines into per-product figures

pub mod engine;
pub mod error;
pub mod range;
pub mod sales;
pub mod stock;

pub use engine::{Report, ReportEngine, SalesReport};
pub use error::{ReportError, Result};
pub use range::{ReportKind, ReportRange};
pub use sales::{ProductSales, RATING_LIMIT, SalesAccumulator};
pub use stock::ProductStock;

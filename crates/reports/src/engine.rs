//! Reporting Aggregation Engine.

use std::time::Instant;

use domain::{AmountOverflow, Money, OrderSnapshot, OrderStatus, SnapshotError};
use futures_util::StreamExt;
use serde::Serialize;
use store::{OrderQuery, OrderRecord, Store};
use thiserror::Error;

use crate::sales::{self, ProductSales, RATING_LIMIT, SalesAccumulator};
use crate::stock::{self, ProductStock};
use crate::{ReportKind, ReportRange, Result};

/// Sales or rating output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesReport {
    pub entries: Vec<ProductSales>,
    pub total_overall_revenue: Money,
    /// Qualifying orders whose snapshot could not be read.
    pub skipped_orders: u64,
}

/// Output of [`ReportEngine::generate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Report {
    Sales(SalesReport),
    Rating(SalesReport),
    Stock(Vec<ProductStock>),
}

impl Report {
    /// Returns the report kind.
    pub fn kind(&self) -> ReportKind {
        match self {
            Report::Sales(_) => ReportKind::Sales,
            Report::Rating(_) => ReportKind::Rating,
            Report::Stock(_) => ReportKind::Stock,
        }
    }
}

/// Produces reports by scanning stored orders and products.
///
/// Reads only. A qualifying order whose snapshot fails validation is logged
/// and left out; it never fails the report.
pub struct ReportEngine<S: Store> {
    store: S,
}

impl<S: Store> ReportEngine<S> {
    /// Creates a new engine over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Generates a report of `kind`. Sales and rating need a range; stock
    /// ignores it.
    pub async fn generate(&self, kind: ReportKind, range: Option<ReportRange>) -> Result<Report> {
        let started = Instant::now();
        let report = match kind {
            ReportKind::Sales => Report::Sales(self.sales(require(kind, range)?).await?),
            ReportKind::Rating => Report::Rating(self.rating(require(kind, range)?).await?),
            ReportKind::Stock => Report::Stock(self.stock().await?),
        };

        metrics::counter!("reports_generated_total", "kind" => kind.as_str()).increment(1);
        metrics::histogram!("report_duration_seconds", "kind" => kind.as_str())
            .record(started.elapsed().as_secs_f64());
        Ok(report)
    }

    /// Per-product sales for fulfilled orders created inside `range`.
    #[tracing::instrument(skip(self))]
    pub async fn sales(&self, range: ReportRange) -> Result<SalesReport> {
        let (acc, skipped_orders) = self.accumulate(range).await?;
        let orders = acc.order_count();
        let entries = acc.finish();
        let total_overall_revenue = sales::total_revenue(&entries)?;

        tracing::info!(
            orders,
            products = entries.len(),
            skipped_orders,
            revenue = %total_overall_revenue,
            "sales report generated"
        );
        Ok(SalesReport {
            entries,
            total_overall_revenue,
            skipped_orders,
        })
    }

    /// The best selling products in `range`, at most [`RATING_LIMIT`].
    #[tracing::instrument(skip(self))]
    pub async fn rating(&self, range: ReportRange) -> Result<SalesReport> {
        let mut report = self.sales(range).await?;
        report.entries.truncate(RATING_LIMIT);
        Ok(report)
    }

    /// Current stock for every product.
    #[tracing::instrument(skip(self))]
    pub async fn stock(&self) -> Result<Vec<ProductStock>> {
        let products = self.store.list_products().await?;
        Ok(stock::stock_levels(products))
    }

    async fn accumulate(&self, range: ReportRange) -> Result<(SalesAccumulator, u64)> {
        let query = OrderQuery::for_status(OrderStatus::Succeeded.as_str())
            .created_between(range.start_at(), range.end_at());
        let mut orders = self.store.stream_orders(query).await?;

        let mut acc = SalesAccumulator::new();
        let mut skipped = 0u64;
        while let Some(record) = orders.next().await {
            let record = record?;
            if let Err(error) = fold_order(&mut acc, &record) {
                skipped += 1;
                metrics::counter!("report_orders_skipped_total").increment(1);
                tracing::warn!(order_id = %record.id, %error, "skipping unreadable order");
            }
        }
        Ok((acc, skipped))
    }
}

fn require(kind: ReportKind, range: Option<ReportRange>) -> Result<ReportRange> {
    range.ok_or(crate::ReportError::MissingRange(kind.as_str()))
}

/// Why a qualifying order was left out of a report.
#[derive(Debug, Error)]
enum Unreadable {
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Amount(#[from] AmountOverflow),
}

fn fold_order(acc: &mut SalesAccumulator, record: &OrderRecord) -> std::result::Result<(), Unreadable> {
    let lines = OrderSnapshot::parse(&record.items)?.validated_lines()?;
    acc.add_order(&lines)?;
    Ok(())
}

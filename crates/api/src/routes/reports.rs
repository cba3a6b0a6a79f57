//! Report endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use domain::Money;
use reports::{ProductSales, ProductStock, Report, ReportKind, ReportRange};
use serde::{Deserialize, Serialize};
use store::Store;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportParams {
    #[serde(rename = "type")]
    pub kind: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum ReportBody {
    Sales(Vec<ProductSales>),
    Stock(Vec<ProductStock>),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub success: bool,
    pub report_type: ReportKind,
    pub report: ReportBody,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_overall_revenue: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped_orders: Option<u64>,
}

impl From<Report> for ReportResponse {
    fn from(report: Report) -> Self {
        let report_type = report.kind();
        match report {
            Report::Sales(sales) => Self {
                success: true,
                report_type,
                report: ReportBody::Sales(sales.entries),
                total_overall_revenue: Some(sales.total_overall_revenue),
                skipped_orders: Some(sales.skipped_orders),
            },
            Report::Rating(rating) => Self {
                success: true,
                report_type,
                report: ReportBody::Sales(rating.entries),
                total_overall_revenue: None,
                skipped_orders: Some(rating.skipped_orders),
            },
            Report::Stock(levels) => Self {
                success: true,
                report_type,
                report: ReportBody::Stock(levels),
                total_overall_revenue: None,
                skipped_orders: None,
            },
        }
    }
}

/// GET /reports?type=sales|rating|stock&startDate=..&endDate=..
#[tracing::instrument(skip(state, params))]
pub async fn generate<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    params: Result<Query<ReportParams>, QueryRejection>,
) -> Result<Json<ReportResponse>, ApiError> {
    let Query(params) = params?;
    let kind: ReportKind = params.kind.parse()?;

    let range = match (kind.needs_range(), params.start_date, params.end_date) {
        (true, Some(start), Some(end)) => Some(ReportRange::parse(&start, &end)?),
        _ => None,
    };

    let report = state.reports.generate(kind, range).await?;
    Ok(Json(report.into()))
}

//! Current stock levels.

use chrono::{DateTime, Utc};
use common::ProductId;
use serde::Serialize;
use store::ProductRecord;

/// Stock on hand for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductStock {
    pub product_id: ProductId,
    pub name: String,
    pub amount: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRecord> for ProductStock {
    fn from(product: ProductRecord) -> Self {
        Self {
            product_id: product.id,
            name: product.name,
            amount: product.amount,
            updated_at: product.updated_at,
        }
    }
}

/// Orders rows by name, then id.
pub fn stock_levels(products: Vec<ProductRecord>) -> Vec<ProductStock> {
    let mut rows: Vec<ProductStock> = products.into_iter().map(ProductStock::from).collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.product_id.cmp(&b.product_id)));
    rows
}

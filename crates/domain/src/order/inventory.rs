//! Inventory Adjustment planning.

use std::collections::BTreeMap;

use common::ProductId;
use store::StockAdjustment;

use super::{OrderSnapshot, SnapshotError};

/// Turns a snapshot into one decrement per distinct product.
///
/// Fails closed: any line that cannot be attributed to a product aborts the
/// whole plan rather than being skipped.
pub fn plan_adjustments(snapshot: &OrderSnapshot) -> Result<Vec<StockAdjustment>, SnapshotError> {
    let mut per_product: BTreeMap<ProductId, i64> = BTreeMap::new();
    for line in snapshot.validated_lines()? {
        *per_product.entry(line.product_id).or_default() += i64::from(line.quantity);
    }

    Ok(per_product
        .into_iter()
        .map(|(product_id, quantity)| StockAdjustment {
            product_id,
            quantity,
        })
        .collect())
}

//! Per-product sales aggregation over snapshot lines.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;

use common::ProductId;
use domain::{AmountOverflow, Money, ValidatedLine, pricing};
use serde::Serialize;

/// Number of products kept in a rating report.
pub const RATING_LIMIT: usize = 20;

/// Sales figures for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub product_id: ProductId,
    pub product_name: String,
    pub image_url: Option<String>,
    pub quantity_sold: u64,
    pub total_revenue: Money,
    /// Mean of the per-unit prices (with additionals) of every line that sold
    /// the product, not revenue divided by quantity.
    pub average_price: Money,
}

#[derive(Debug, Clone, Default)]
struct Tally {
    name: String,
    image_url: Option<String>,
    quantity: u64,
    revenue: Money,
    unit_price_sum: Money,
    occurrences: u64,
}

/// Accumulates snapshot lines into per-product sales.
#[derive(Debug, Default)]
pub struct SalesAccumulator {
    products: HashMap<ProductId, Tally>,
    orders: u64,
}

impl SalesAccumulator {
    /// Creates an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every line of one order.
    ///
    /// All or nothing: if any amount overflows, the accumulator is left as
    /// it was before the call.
    pub fn add_order(&mut self, lines: &[ValidatedLine]) -> Result<(), AmountOverflow> {
        let mut staged: HashMap<ProductId, Tally> = HashMap::new();
        for line in lines {
            let tally = match staged.entry(line.product_id) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(
                    self.products
                        .get(&line.product_id)
                        .cloned()
                        .unwrap_or_default(),
                ),
            };
            if tally.name.is_empty() {
                tally.name = line.product_name.clone();
            }
            if tally.image_url.is_none() {
                tally.image_url = line.image_url.clone();
            }
            tally.quantity += u64::from(line.quantity);
            tally.revenue = tally.revenue.checked_add(pricing::line_total(line)?)?;
            tally.unit_price_sum = tally.unit_price_sum.checked_add(pricing::unit_price(line)?)?;
            tally.occurrences += 1;
        }

        self.products.extend(staged);
        self.orders += 1;
        Ok(())
    }

    /// Number of orders added.
    pub fn order_count(&self) -> u64 {
        self.orders
    }

    /// Returns the entries sorted by quantity sold, then revenue, both
    /// descending, with product id as a final tie-break.
    pub fn finish(self) -> Vec<ProductSales> {
        let mut entries: Vec<ProductSales> = self
            .products
            .into_iter()
            .map(|(product_id, tally)| ProductSales {
                product_id,
                product_name: tally.name,
                image_url: tally.image_url,
                quantity_sold: tally.quantity,
                total_revenue: tally.revenue,
                average_price: Money::mean(tally.unit_price_sum, tally.occurrences),
            })
            .collect();
        entries.sort_by(rank);
        entries
    }
}

fn rank(a: &ProductSales, b: &ProductSales) -> Ordering {
    b.quantity_sold
        .cmp(&a.quantity_sold)
        .then_with(|| b.total_revenue.cmp(&a.total_revenue))
        .then_with(|| a.product_id.cmp(&b.product_id))
}

/// Sum of revenue over `entries`.
pub fn total_revenue(entries: &[ProductSales]) -> Result<Money, AmountOverflow> {
    Money::checked_sum(entries.iter().map(|e| e.total_revenue))
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::VariantId;

    fn line(product: i64, price: i64, additionals: &[i64], quantity: u32) -> ValidatedLine {
        ValidatedLine {
            product_id: ProductId::new(product),
            product_name: format!("Product {product}"),
            image_url: None,
            variant_id: VariantId::new(product * 10),
            unit_price: Money::from_cents(price),
            additional_prices: additionals.iter().copied().map(Money::from_cents).collect(),
            quantity,
        }
    }

    #[test]
    fn revenue_and_quantity_accumulate_per_product() {
        let mut acc = SalesAccumulator::new();
        acc.add_order(&[line(1, 100, &[20], 2)]).unwrap();
        acc.add_order(&[line(1, 100, &[], 1), line(2, 500, &[], 1)]).unwrap();
        let entries = acc.finish();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].product_id, ProductId::new(1));
        assert_eq!(entries[0].quantity_sold, 3);
        assert_eq!(entries[0].total_revenue.cents(), 340);
        assert_eq!(total_revenue(&entries).unwrap().cents(), 840);
    }

    #[test]
    fn average_is_mean_of_unit_prices_not_revenue_over_quantity() {
        let mut acc = SalesAccumulator::new();
        acc.add_order(&[line(1, 100, &[], 9)]).unwrap();
        acc.add_order(&[line(1, 200, &[], 1)]).unwrap();
        let entries = acc.finish();

        // (100 + 200) / 2, whereas revenue / quantity would be 110.
        assert_eq!(entries[0].average_price.cents(), 150);
    }

    #[test]
    fn ties_on_quantity_break_on_revenue() {
        let mut acc = SalesAccumulator::new();
        acc.add_order(&[line(1, 100, &[], 2), line(2, 300, &[], 2), line(3, 50, &[], 5)]).unwrap();
        let ids: Vec<i64> = acc.finish().iter().map(|e| e.product_id.as_i64()).collect();

        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn empty_accumulator_finishes_empty() {
        let acc = SalesAccumulator::new();
        assert_eq!(acc.order_count(), 0);
        let entries = acc.finish();
        assert!(entries.is_empty());
        assert_eq!(total_revenue(&entries), Ok(Money::zero()));
    }

    #[test]
    fn overflowing_order_leaves_totals_untouched() {
        let mut acc = SalesAccumulator::new();
        acc.add_order(&[line(1, 100, &[], 1)]).unwrap();

        let result = acc.add_order(&[line(2, 7, &[], 3), line(1, i64::MAX, &[], 2)]);

        assert_eq!(result, Err(AmountOverflow));
        assert_eq!(acc.order_count(), 1);
        let entries = acc.finish();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quantity_sold, 1);
        assert_eq!(entries[0].total_revenue.cents(), 100);
    }
}

//! Cart Pricing Calculator.
//!
//! The same functions price a cart on display, at checkout, and when a report
//! replays a frozen snapshot, so the three can never disagree. Arithmetic is
//! checked: an amount outside the range of `i64` cents is an error.

use crate::value_objects::{AmountOverflow, Money};

/// A line whose prices are already resolved.
pub trait PricedLine {
    /// Unit price of the variant.
    fn base_price(&self) -> Money;

    /// Prices of the selected additionals, one per additional.
    fn additional_prices(&self) -> impl Iterator<Item = Money> + '_;

    /// Number of units on the line.
    fn quantity(&self) -> u32;
}

/// Per-unit price including every additional.
pub fn unit_price<L: PricedLine + ?Sized>(line: &L) -> Result<Money, AmountOverflow> {
    line.additional_prices()
        .try_fold(line.base_price(), Money::checked_add)
}

/// `(unitPrice + Σ additionalPrices) × quantity`.
pub fn line_total<L: PricedLine + ?Sized>(line: &L) -> Result<Money, AmountOverflow> {
    unit_price(line)?.checked_multiply(line.quantity())
}

/// Sum of every line total.
pub fn cart_total<'a, L, I>(lines: I) -> Result<Money, AmountOverflow>
where
    L: PricedLine + 'a,
    I: IntoIterator<Item = &'a L>,
{
    lines
        .into_iter()
        .try_fold(Money::zero(), |total, line| total.checked_add(line_total(line)?))
}

//! Cart aggregate: line bookkeeping over a stored cart record.

use chrono::Utc;
use common::{AdditionalId, CartLineId, VariantId};
use store::{CartLineRecord, CartRecord};

use crate::error::DomainError;

/// Upper bound on the units a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// A mutable shopping cart.
///
/// Lines reference catalog rows only; prices are looked up when the cart is
/// resolved, never stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    record: CartRecord,
}

impl Cart {
    /// Wraps a stored cart.
    pub fn from_record(record: CartRecord) -> Self {
        Self { record }
    }

    /// Returns the underlying record.
    pub fn record(&self) -> &CartRecord {
        &self.record
    }

    /// Consumes the cart, returning its record.
    pub fn into_record(self) -> CartRecord {
        self.record
    }

    /// Returns the lines in display order.
    pub fn lines(&self) -> &[CartLineRecord] {
        &self.record.lines
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.record.lines.is_empty()
    }

    /// Returns the total number of units across all lines.
    pub fn unit_count(&self) -> u64 {
        self.record.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    /// Adds `quantity` units of a variant with the given additionals.
    ///
    /// A line with the same variant and the same set of additionals absorbs
    /// the quantity instead of creating a new line. Returns the line id.
    pub fn add_line(
        &mut self,
        variant_id: VariantId,
        additional_ids: Vec<AdditionalId>,
        quantity: u32,
    ) -> Result<CartLineId, DomainError> {
        if quantity == 0 {
            return Err(DomainError::Validation(
                "quantity must be at least 1".to_string(),
            ));
        }
        check_limit(u64::from(quantity))?;

        let additional_ids = normalize(additional_ids);
        if let Some(line) = self
            .record
            .lines
            .iter_mut()
            .find(|l| l.variant_id == variant_id && l.additional_ids == additional_ids)
        {
            line.quantity = check_limit(u64::from(line.quantity) + u64::from(quantity))?;
            return Ok(line.id);
        }

        let id = self.next_line_id();
        self.record.lines.push(CartLineRecord {
            id,
            variant_id,
            additional_ids,
            quantity,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    /// Sets a line's quantity. Zero removes the line.
    pub fn update_quantity(&mut self, line_id: CartLineId, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return self.remove_line(line_id);
        }
        check_limit(u64::from(quantity))?;

        let line = self
            .record
            .lines
            .iter_mut()
            .find(|l| l.id == line_id)
            .ok_or(DomainError::CartLineNotFound(line_id))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Removes a line.
    pub fn remove_line(&mut self, line_id: CartLineId) -> Result<(), DomainError> {
        let index = self
            .record
            .lines
            .iter()
            .position(|l| l.id == line_id)
            .ok_or(DomainError::CartLineNotFound(line_id))?;
        self.record.lines.remove(index);
        Ok(())
    }

    /// Stores a freshly computed total.
    pub(crate) fn set_total(&mut self, total_cents: i64) {
        self.record.total_amount_cents = total_cents;
    }

    fn next_line_id(&self) -> CartLineId {
        let max = self
            .record
            .lines
            .iter()
            .map(|l| l.id.as_i64())
            .max()
            .unwrap_or(0);
        CartLineId::new(max + 1)
    }
}

fn check_limit(quantity: u64) -> Result<u32, DomainError> {
    u32::try_from(quantity)
        .ok()
        .filter(|q| *q <= MAX_LINE_QUANTITY)
        .ok_or_else(|| {
            DomainError::Validation(format!(
                "quantity {quantity} exceeds the limit of {MAX_LINE_QUANTITY} per line"
            ))
        })
}

/// Sorted and deduplicated, so line matching ignores selection order.
fn normalize(mut ids: Vec<AdditionalId>) -> Vec<AdditionalId> {
    ids.sort();
    ids.dedup();
    ids
}

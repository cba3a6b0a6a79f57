use std::collections::HashSet;
use std::pin::Pin;

use async_trait::async_trait;
use common::{AdditionalId, CartToken, OrderId, ProductId, VariantId};
use futures_core::Stream;

use crate::{
    AdditionalRecord, CartLineRecord, CartRecord, OrderQuery, OrderRecord, ProductRecord, Result,
    StatusChange, StockAdjustment, StoreError, VariantRecord,
};

/// A stream of orders.
pub type OrderStream = Pin<Box<dyn Stream<Item = Result<OrderRecord>> + Send>>;

/// Repository for the storefront order core.
///
/// Every call is its own unit of work. Implementations must make each
/// mutating call atomic: either every row it touches is written, or none is.
#[async_trait]
pub trait Store: Send + Sync {
    /// Inserts or replaces a product row.
    async fn upsert_product(&self, product: ProductRecord) -> Result<()>;

    /// Inserts or replaces a variant row. The product must exist.
    async fn upsert_variant(&self, variant: VariantRecord) -> Result<()>;

    /// Inserts or replaces an additional.
    async fn upsert_additional(&self, additional: AdditionalRecord) -> Result<()>;

    /// Retrieves a product by id.
    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>>;

    /// Retrieves all products, ordered by name then id.
    async fn list_products(&self) -> Result<Vec<ProductRecord>>;

    /// Retrieves a variant by id.
    async fn get_variant(&self, id: VariantId) -> Result<Option<VariantRecord>>;

    /// Retrieves an additional by id.
    async fn get_additional(&self, id: AdditionalId) -> Result<Option<AdditionalRecord>>;

    /// Returns the cart for `token`, creating an empty one if none exists.
    async fn get_or_create_cart(&self, token: &CartToken) -> Result<CartRecord>;

    /// Retrieves a cart with its lines.
    async fn get_cart(&self, token: &CartToken) -> Result<Option<CartRecord>>;

    /// Replaces the cart's lines and total if the stored version still equals
    /// `cart.version`. Returns the saved cart with its bumped version.
    async fn save_cart(&self, cart: CartRecord) -> Result<CartRecord>;

    /// Rewrites the cached total of a cart still at `expected_version`,
    /// leaving the version untouched. Returns false when the cart moved on
    /// or no longer exists.
    async fn refresh_cart_total(
        &self,
        token: &CartToken,
        expected_version: i64,
        total_amount_cents: i64,
    ) -> Result<bool>;

    /// Inserts `order` and empties the cart in one transaction, provided the
    /// cart is still at `expected_cart_version`.
    async fn place_order(
        &self,
        order: OrderRecord,
        cart_token: &CartToken,
        expected_cart_version: i64,
    ) -> Result<()>;

    /// Retrieves an order by id.
    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>>;

    /// Compare-and-swap on the order's version: writes the new status and
    /// applies every stock decrement in one transaction.
    ///
    /// Fails with `ConcurrencyConflict` when the order moved on since it was
    /// read, and with `InsufficientStock` when the policy rejects a decrement.
    async fn transition_order(&self, change: StatusChange) -> Result<OrderRecord>;

    /// Streams orders matching the query, oldest first.
    async fn stream_orders(&self, query: OrderQuery) -> Result<OrderStream>;
}

/// Extension trait providing convenience methods for stores.
#[async_trait]
pub trait StoreExt: Store {
    /// Collects every order matching the query.
    async fn collect_orders(&self, query: OrderQuery) -> Result<Vec<OrderRecord>> {
        use futures_util::TryStreamExt;

        self.stream_orders(query).await?.try_collect().await
    }

    /// Checks if a cart exists.
    async fn cart_exists(&self, token: &CartToken) -> Result<bool> {
        Ok(self.get_cart(token).await?.is_some())
    }
}

// Blanket implementation for all Store implementations
impl<T: Store + ?Sized> StoreExt for T {}

/// Error returned for a malformed set of stock adjustments.
#[derive(Debug, Clone)]
pub struct AdjustmentValidationError {
    pub message: String,
}

impl std::fmt::Display for AdjustmentValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Stock adjustment validation error: {}", self.message)
    }
}

impl std::error::Error for AdjustmentValidationError {}

/// Validates adjustments before a transition is applied.
///
/// Each product may appear once and every quantity must be positive.
pub fn validate_adjustments(
    adjustments: &[StockAdjustment],
) -> std::result::Result<(), AdjustmentValidationError> {
    let mut seen = HashSet::new();
    for adjustment in adjustments {
        if adjustment.quantity <= 0 {
            return Err(AdjustmentValidationError {
                message: format!(
                    "quantity for product {} must be positive, got {}",
                    adjustment.product_id, adjustment.quantity
                ),
            });
        }
        if !seen.insert(adjustment.product_id) {
            return Err(AdjustmentValidationError {
                message: format!("product {} adjusted more than once", adjustment.product_id),
            });
        }
    }
    Ok(())
}

/// Quantity of a cart line as stored in an `INTEGER` column.
///
/// Lines must hold at least one unit.
pub(crate) fn stored_quantity(line: &CartLineRecord) -> Result<i32> {
    i32::try_from(line.quantity)
        .ok()
        .filter(|quantity| *quantity > 0)
        .ok_or(StoreError::InvalidQuantity {
            line_id: line.id,
            quantity: line.quantity,
        })
}

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{AdditionalId, CartToken, OrderId, ProductId, VariantId};
use tokio::sync::RwLock;

use crate::{
    AdditionalRecord, CartRecord, OrderQuery, OrderRecord, ProductRecord, Result, StatusChange,
    StockPolicy, StoreError, VariantRecord,
    store::{OrderStream, Store, stored_quantity, validate_adjustments},
};

#[derive(Debug, Default)]
struct MemoryState {
    products: HashMap<ProductId, ProductRecord>,
    variants: HashMap<VariantId, VariantRecord>,
    additionals: HashMap<AdditionalId, AdditionalRecord>,
    carts: HashMap<CartToken, CartRecord>,
    orders: HashMap<OrderId, OrderRecord>,
}

/// In-memory store implementation for tests and single-process deployments.
///
/// A single lock guards every table, so each trait call observes and writes
/// a consistent state, matching the transactional guarantees of the
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Overwrites the raw snapshot document of an order.
    ///
    /// Only meant for exercising corrupted-data paths in tests.
    pub async fn overwrite_order_items(&self, id: OrderId, items: impl Into<String>) -> Result<()> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("order", id))?;
        order.items = items.into();
        Ok(())
    }

    /// Inserts an order as-is, bypassing checkout.
    pub async fn insert_order(&self, order: OrderRecord) {
        self.state.write().await.orders.insert(order.id, order);
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = MemoryState::default();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn upsert_product(&self, product: ProductRecord) -> Result<()> {
        self.state
            .write()
            .await
            .products
            .insert(product.id, product);
        Ok(())
    }

    async fn upsert_variant(&self, variant: VariantRecord) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.products.contains_key(&variant.product_id) {
            return Err(StoreError::not_found("product", variant.product_id));
        }
        state.variants.insert(variant.id, variant);
        Ok(())
    }

    async fn upsert_additional(&self, additional: AdditionalRecord) -> Result<()> {
        self.state
            .write()
            .await
            .additionals
            .insert(additional.id, additional);
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<ProductRecord>> {
        let state = self.state.read().await;
        let mut products: Vec<_> = state.products.values().cloned().collect();
        products.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(products)
    }

    async fn get_variant(&self, id: VariantId) -> Result<Option<VariantRecord>> {
        Ok(self.state.read().await.variants.get(&id).cloned())
    }

    async fn get_additional(&self, id: AdditionalId) -> Result<Option<AdditionalRecord>> {
        Ok(self.state.read().await.additionals.get(&id).cloned())
    }

    async fn get_or_create_cart(&self, token: &CartToken) -> Result<CartRecord> {
        let mut state = self.state.write().await;
        let cart = state
            .carts
            .entry(token.clone())
            .or_insert_with(|| CartRecord::empty(token.clone()));
        Ok(cart.clone())
    }

    async fn get_cart(&self, token: &CartToken) -> Result<Option<CartRecord>> {
        Ok(self.state.read().await.carts.get(token).cloned())
    }

    async fn save_cart(&self, mut cart: CartRecord) -> Result<CartRecord> {
        for line in &cart.lines {
            stored_quantity(line)?;
        }

        let mut state = self.state.write().await;
        let stored = state
            .carts
            .get_mut(&cart.token)
            .ok_or_else(|| StoreError::not_found("cart", &cart.token))?;

        if stored.version != cart.version {
            return Err(StoreError::conflict(
                "cart",
                &cart.token,
                cart.version,
                stored.version,
            ));
        }

        cart.version += 1;
        cart.updated_at = Utc::now();
        *stored = cart.clone();
        Ok(cart)
    }

    async fn refresh_cart_total(
        &self,
        token: &CartToken,
        expected_version: i64,
        total_amount_cents: i64,
    ) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.carts.get_mut(token) {
            Some(cart) if cart.version == expected_version => {
                cart.total_amount_cents = total_amount_cents;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn place_order(
        &self,
        order: OrderRecord,
        cart_token: &CartToken,
        expected_cart_version: i64,
    ) -> Result<()> {
        let mut state = self.state.write().await;

        if state.orders.contains_key(&order.id) {
            return Err(StoreError::conflict("order", order.id, 0, order.version));
        }

        let cart = state
            .carts
            .get_mut(cart_token)
            .ok_or_else(|| StoreError::not_found("cart", cart_token))?;

        if cart.version != expected_cart_version {
            return Err(StoreError::conflict(
                "cart",
                cart_token,
                expected_cart_version,
                cart.version,
            ));
        }

        cart.lines.clear();
        cart.total_amount_cents = 0;
        cart.version += 1;
        cart.updated_at = Utc::now();

        state.orders.insert(order.id, order);
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn transition_order(&self, change: StatusChange) -> Result<OrderRecord> {
        validate_adjustments(&change.adjustments)?;

        let mut state = self.state.write().await;

        let current_version = state
            .orders
            .get(&change.order_id)
            .map(|o| o.version)
            .ok_or_else(|| StoreError::not_found("order", change.order_id))?;

        if current_version != change.expected_version {
            return Err(StoreError::conflict(
                "order",
                change.order_id,
                change.expected_version,
                current_version,
            ));
        }

        // Validate every decrement before touching anything so a rejection
        // leaves all rows unchanged.
        for adjustment in &change.adjustments {
            let product = state
                .products
                .get(&adjustment.product_id)
                .ok_or_else(|| StoreError::not_found("product", adjustment.product_id))?;
            if change.policy == StockPolicy::Reject && product.amount < adjustment.quantity {
                return Err(StoreError::InsufficientStock {
                    product_id: adjustment.product_id,
                    available: product.amount,
                    requested: adjustment.quantity,
                });
            }
        }

        let now = Utc::now();
        for adjustment in &change.adjustments {
            if let Some(product) = state.products.get_mut(&adjustment.product_id) {
                product.amount -= adjustment.quantity;
                product.updated_at = now;
            }
        }

        let order = state
            .orders
            .get_mut(&change.order_id)
            .ok_or_else(|| StoreError::not_found("order", change.order_id))?;
        order.status = change.status;
        order.version += 1;
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn stream_orders(&self, query: OrderQuery) -> Result<OrderStream> {
        use futures_util::stream;

        let state = self.state.read().await;
        let mut orders: Vec<_> = state
            .orders
            .values()
            .filter(|o| query.matches(o))
            .cloned()
            .collect();

        orders.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then(a.id.as_uuid().cmp(&b.id.as_uuid()))
        });

        if let Some(limit) = query.limit {
            orders.truncate(limit);
        }

        Ok(Box::pin(stream::iter(orders.into_iter().map(Ok))))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration};
    use common::{CartLineId, UserId};

    use super::*;
    use crate::{CartLineRecord, StockAdjustment, StoreExt};

    fn order(status: &str, created_at: DateTime<Utc>) -> OrderRecord {
        OrderRecord {
            id: OrderId::new(),
            user_id: UserId::new(),
            cart_token: CartToken::new("cart"),
            status: status.to_string(),
            total_amount_cents: 2000,
            items: "[]".to_string(),
            full_name: "Jo Doe".to_string(),
            email: "jo@example.com".to_string(),
            phone: "+10000000000".to_string(),
            address: "1 Main St".to_string(),
            comment: None,
            version: 1,
            created_at,
            updated_at: created_at,
        }
    }

    async fn store_with_product(amount: i64) -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .upsert_product(ProductRecord::new(ProductId::new(1), "Widget", amount))
            .await
            .unwrap();
        store
    }

    fn decrement(order: &OrderRecord, quantity: i64, policy: StockPolicy) -> StatusChange {
        StatusChange {
            order_id: order.id,
            expected_version: order.version,
            status: "SUCCEDED".to_string(),
            adjustments: vec![StockAdjustment {
                product_id: ProductId::new(1),
                quantity,
            }],
            policy,
        }
    }

    #[tokio::test]
    async fn variant_requires_existing_product() {
        let store = InMemoryStore::new();
        let result = store
            .upsert_variant(VariantRecord {
                id: VariantId::new(1),
                product_id: ProductId::new(99),
                price_cents: 100,
                kit_amount: 0,
            })
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_products_sorted_by_name() {
        let store = InMemoryStore::new();
        store
            .upsert_product(ProductRecord::new(ProductId::new(2), "Zeta", 1))
            .await
            .unwrap();
        store
            .upsert_product(ProductRecord::new(ProductId::new(1), "Alpha", 1))
            .await
            .unwrap();

        let names: Vec<_> = store
            .list_products()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn save_cart_bumps_version_and_detects_stale_writes() {
        let store = InMemoryStore::new();
        let token = CartToken::new("abc");
        let mut cart = store.get_or_create_cart(&token).await.unwrap();
        cart.lines.push(CartLineRecord {
            id: CartLineId::new(1),
            variant_id: VariantId::new(1),
            additional_ids: vec![],
            quantity: 1,
            created_at: Utc::now(),
        });

        let saved = store.save_cart(cart.clone()).await.unwrap();
        assert_eq!(saved.version, 1);

        let stale = store.save_cart(cart).await;
        assert!(matches!(
            stale,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
    }

    #[tokio::test]
    async fn save_cart_rejects_quantities_the_database_cannot_hold() {
        let store = InMemoryStore::new();
        let token = CartToken::new("abc");
        let mut cart = store.get_or_create_cart(&token).await.unwrap();
        cart.lines.push(CartLineRecord {
            id: CartLineId::new(1),
            variant_id: VariantId::new(1),
            additional_ids: vec![],
            quantity: u32::MAX,
            created_at: Utc::now(),
        });

        let result = store.save_cart(cart).await;

        assert!(matches!(
            result,
            Err(StoreError::InvalidQuantity { quantity: u32::MAX, .. })
        ));
        let stored = store.get_cart(&token).await.unwrap().unwrap();
        assert!(stored.lines.is_empty());
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn refresh_cart_total_only_applies_to_the_expected_version() {
        let store = InMemoryStore::new();
        let token = CartToken::new("abc");
        let cart = store.get_or_create_cart(&token).await.unwrap();

        assert!(store.refresh_cart_total(&token, cart.version, 500).await.unwrap());
        assert!(!store.refresh_cart_total(&token, cart.version + 1, 900).await.unwrap());
        assert!(
            !store
                .refresh_cart_total(&CartToken::new("missing"), 0, 100)
                .await
                .unwrap()
        );

        let stored = store.get_cart(&token).await.unwrap().unwrap();
        assert_eq!(stored.total_amount_cents, 500);
        assert_eq!(stored.version, cart.version);
    }

    #[tokio::test]
    async fn place_order_clears_cart_atomically() {
        let store = InMemoryStore::new();
        let token = CartToken::new("abc");
        let mut cart = store.get_or_create_cart(&token).await.unwrap();
        cart.total_amount_cents = 2000;
        let cart = store.save_cart(cart).await.unwrap();

        let order = order("PENDING", Utc::now());
        store
            .place_order(order.clone(), &token, cart.version)
            .await
            .unwrap();

        let cart = store.get_cart(&token).await.unwrap().unwrap();
        assert!(cart.lines.is_empty());
        assert_eq!(cart.total_amount_cents, 0);
        assert!(store.get_order(order.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn place_order_with_stale_cart_version_writes_nothing() {
        let store = InMemoryStore::new();
        let token = CartToken::new("abc");
        store.get_or_create_cart(&token).await.unwrap();

        let result = store.place_order(order("PENDING", Utc::now()), &token, 7).await;

        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn transition_decrements_stock_and_bumps_version() {
        let store = store_with_product(10).await;
        let pending = order("PENDING", Utc::now());
        store.insert_order(pending.clone()).await;

        let updated = store
            .transition_order(decrement(&pending, 3, StockPolicy::Reject))
            .await
            .unwrap();

        assert_eq!(updated.status, "SUCCEDED");
        assert_eq!(updated.version, 2);
        let product = store.get_product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(product.amount, 7);
    }

    #[tokio::test]
    async fn transition_with_stale_version_conflicts() {
        let store = store_with_product(10).await;
        let pending = order("PENDING", Utc::now());
        store.insert_order(pending.clone()).await;

        store
            .transition_order(decrement(&pending, 3, StockPolicy::Reject))
            .await
            .unwrap();
        let second = store
            .transition_order(decrement(&pending, 3, StockPolicy::Reject))
            .await;

        assert!(matches!(
            second,
            Err(StoreError::ConcurrencyConflict { .. })
        ));
        let product = store.get_product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(product.amount, 7);
    }

    #[tokio::test]
    async fn reject_policy_leaves_everything_unchanged() {
        let store = store_with_product(1).await;
        let pending = order("PENDING", Utc::now());
        store.insert_order(pending.clone()).await;

        let result = store
            .transition_order(decrement(&pending, 2, StockPolicy::Reject))
            .await;

        assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));
        let stored = store.get_order(pending.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "PENDING");
        let product = store.get_product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(product.amount, 1);
    }

    #[tokio::test]
    async fn allow_negative_policy_backorders() {
        let store = store_with_product(1).await;
        let pending = order("PENDING", Utc::now());
        store.insert_order(pending.clone()).await;

        store
            .transition_order(decrement(&pending, 3, StockPolicy::AllowNegative))
            .await
            .unwrap();

        let product = store.get_product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(product.amount, -2);
    }

    #[tokio::test]
    async fn transition_on_missing_product_fails() {
        let store = InMemoryStore::new();
        let pending = order("PENDING", Utc::now());
        store.insert_order(pending.clone()).await;

        let result = store
            .transition_order(decrement(&pending, 1, StockPolicy::AllowNegative))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn stream_orders_filters_and_sorts() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let late = order("SUCCEDED", now);
        let early = order("SUCCEDED", now - Duration::hours(2));
        let cancelled = order("CANCELLED", now - Duration::hours(1));
        store.insert_order(late.clone()).await;
        store.insert_order(early.clone()).await;
        store.insert_order(cancelled).await;

        let orders = store
            .collect_orders(OrderQuery::for_status("SUCCEDED"))
            .await
            .unwrap();

        let ids: Vec<_> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
    }

    #[tokio::test]
    async fn stream_orders_respects_limit() {
        let store = InMemoryStore::new();
        for _ in 0..5 {
            store.insert_order(order("PENDING", Utc::now())).await;
        }

        let orders = store
            .collect_orders(OrderQuery::new().limit(2))
            .await
            .unwrap();
        assert_eq!(orders.len(), 2);
    }
}

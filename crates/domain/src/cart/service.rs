//! Cart service: loads, mutates, re-prices, and saves carts.

use common::{AdditionalId, CartLineId, CartToken, VariantId};
use store::{CartRecord, Store, StoreError};

use crate::catalog::{self, ResolvedCart};
use crate::error::DomainError;

use super::Cart;

/// Service for managing shopping carts.
///
/// Every mutation re-prices the cart with the current catalog and saves the
/// recomputed total together with the lines. The stored total is a cache of
/// the last pricing; reads refresh it when catalog prices have moved.
pub struct CartService<S: Store> {
    store: S,
}

impl<S: Store> CartService<S> {
    /// Creates a new cart service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an empty cart and returns its token.
    #[tracing::instrument(skip(self))]
    pub async fn create_cart(&self) -> Result<CartToken, DomainError> {
        let token = CartToken::generate();
        self.store.get_or_create_cart(&token).await?;
        tracing::debug!(cart = %token, "cart created");
        Ok(token)
    }

    /// Returns the cart priced against the current catalog.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, token: &CartToken) -> Result<ResolvedCart, DomainError> {
        let record = self.load(token).await?;
        let resolved = catalog::resolve_cart(&self.store, &record).await?;

        let total = resolved.total_amount.cents();
        if total != record.total_amount_cents {
            // A lost race leaves the newer write's total in place.
            let refreshed = self
                .store
                .refresh_cart_total(token, record.version, total)
                .await?;
            tracing::debug!(cart = %token, total, refreshed, "stored cart total refreshed");
        }
        Ok(resolved)
    }

    /// Adds a variant to the cart, creating the cart on first use.
    #[tracing::instrument(skip(self))]
    pub async fn add_line(
        &self,
        token: &CartToken,
        variant_id: VariantId,
        additional_ids: Vec<AdditionalId>,
        quantity: u32,
    ) -> Result<ResolvedCart, DomainError> {
        let variant = catalog::resolve_variant(&self.store, variant_id).await?;
        if !additional_ids.is_empty() && !variant.is_kit() {
            return Err(DomainError::Validation(format!(
                "variant {variant_id} does not accept additionals"
            )));
        }
        for id in &additional_ids {
            catalog::resolve_additional(&self.store, *id).await?;
        }

        let mut cart = Cart::from_record(self.store.get_or_create_cart(token).await?);
        cart.add_line(variant_id, additional_ids, quantity)?;
        self.save(cart).await
    }

    /// Sets a line's quantity; zero removes the line.
    #[tracing::instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        token: &CartToken,
        line_id: CartLineId,
        quantity: u32,
    ) -> Result<ResolvedCart, DomainError> {
        let mut cart = Cart::from_record(self.load(token).await?);
        cart.update_quantity(line_id, quantity)?;
        self.save(cart).await
    }

    /// Removes a line.
    #[tracing::instrument(skip(self))]
    pub async fn remove_line(
        &self,
        token: &CartToken,
        line_id: CartLineId,
    ) -> Result<ResolvedCart, DomainError> {
        let mut cart = Cart::from_record(self.load(token).await?);
        cart.remove_line(line_id)?;
        self.save(cart).await
    }

    async fn load(&self, token: &CartToken) -> Result<CartRecord, DomainError> {
        self.store
            .get_cart(token)
            .await?
            .ok_or_else(|| DomainError::CartNotFound(token.clone()))
    }

    async fn save(&self, mut cart: Cart) -> Result<ResolvedCart, DomainError> {
        let resolved = catalog::resolve_cart(&self.store, cart.record()).await?;
        cart.set_total(resolved.total_amount.cents());

        let saved = self
            .store
            .save_cart(cart.into_record())
            .await
            .map_err(|e| match e {
                StoreError::ConcurrencyConflict { .. } => {
                    DomainError::Conflict("cart was modified concurrently, retry".to_string())
                }
                other => DomainError::Store(other),
            })?;

        Ok(ResolvedCart {
            version: saved.version,
            ..resolved
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::ProductId;
    use store::{AdditionalRecord, InMemoryStore, ProductRecord, VariantRecord};

    async fn seeded() -> CartService<InMemoryStore> {
        let store = InMemoryStore::new();
        store
            .upsert_product(ProductRecord::new(ProductId::new(1), "Pizza", 10))
            .await
            .unwrap();
        store
            .upsert_variant(VariantRecord {
                id: VariantId::new(11),
                product_id: ProductId::new(1),
                price_cents: 100,
                kit_amount: 1,
            })
            .await
            .unwrap();
        store
            .upsert_variant(VariantRecord {
                id: VariantId::new(12),
                product_id: ProductId::new(1),
                price_cents: 150,
                kit_amount: 0,
            })
            .await
            .unwrap();
        store
            .upsert_additional(AdditionalRecord {
                id: AdditionalId::new(21),
                name: "Cheese".to_string(),
                price_cents: 20,
            })
            .await
            .unwrap();
        CartService::new(store)
    }

    #[tokio::test]
    async fn total_is_recomputed_after_each_mutation() {
        let service = seeded().await;
        let token = service.create_cart().await.unwrap();

        let cart = service
            .add_line(&token, VariantId::new(11), vec![AdditionalId::new(21)], 2)
            .await
            .unwrap();
        assert_eq!(cart.total_amount.cents(), 240);

        let cart = service
            .add_line(&token, VariantId::new(12), vec![], 1)
            .await
            .unwrap();
        assert_eq!(cart.total_amount.cents(), 390);

        let line = cart.lines[0].line_id;
        let cart = service.update_quantity(&token, line, 1).await.unwrap();
        assert_eq!(cart.total_amount.cents(), 270);

        let stored = service.store().get_cart(&token).await.unwrap().unwrap();
        assert_eq!(stored.total_amount_cents, 270);
        assert_eq!(stored.version, cart.version);
    }

    #[tokio::test]
    async fn reading_a_repriced_cart_refreshes_the_stored_total() {
        let service = seeded().await;
        let token = service.create_cart().await.unwrap();
        let cart = service
            .add_line(&token, VariantId::new(12), vec![], 2)
            .await
            .unwrap();
        assert_eq!(cart.total_amount.cents(), 300);

        service
            .store()
            .upsert_variant(VariantRecord {
                id: VariantId::new(12),
                product_id: ProductId::new(1),
                price_cents: 175,
                kit_amount: 0,
            })
            .await
            .unwrap();

        let read = service.get_cart(&token).await.unwrap();
        assert_eq!(read.total_amount.cents(), 350);

        let stored = service.store().get_cart(&token).await.unwrap().unwrap();
        assert_eq!(stored.total_amount_cents, 350);
        assert_eq!(stored.version, cart.version);
    }

    #[tokio::test]
    async fn oversized_quantity_is_a_validation_error() {
        let service = seeded().await;
        let token = service.create_cart().await.unwrap();

        let result = service
            .add_line(&token, VariantId::new(12), vec![], u32::MAX)
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));

        let stored = service.store().get_cart(&token).await.unwrap().unwrap();
        assert!(stored.lines.is_empty());
    }

    #[tokio::test]
    async fn additionals_require_kit_variant() {
        let service = seeded().await;
        let token = service.create_cart().await.unwrap();

        let result = service
            .add_line(&token, VariantId::new(12), vec![AdditionalId::new(21)], 1)
            .await;
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn unknown_variant_is_not_found() {
        let service = seeded().await;
        let token = service.create_cart().await.unwrap();

        let result = service.add_line(&token, VariantId::new(99), vec![], 1).await;
        assert!(matches!(
            result,
            Err(DomainError::CatalogItemNotFound { kind: "variant", .. })
        ));
    }

    #[tokio::test]
    async fn removing_last_line_zeroes_total() {
        let service = seeded().await;
        let token = CartToken::new("fresh");

        let cart = service
            .add_line(&token, VariantId::new(11), vec![], 3)
            .await
            .unwrap();
        let line = cart.lines[0].line_id;
        let cart = service.remove_line(&token, line).await.unwrap();

        assert!(cart.is_empty());
        assert_eq!(cart.total_amount.cents(), 0);
    }

    #[tokio::test]
    async fn missing_cart_is_reported() {
        let service = seeded().await;
        let result = service.get_cart(&CartToken::new("nope")).await;
        assert!(matches!(result, Err(DomainError::CartNotFound(_))));
    }
}

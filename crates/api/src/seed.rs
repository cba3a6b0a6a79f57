//! Catalog seed file loaded at startup.
//!
//! Catalog maintenance belongs to external admin tooling; the seed only
//! gives a fresh deployment something to sell.

use std::path::Path;

use chrono::Utc;
use common::{AdditionalId, ProductId, VariantId};
use serde::Deserialize;
use store::{AdditionalRecord, ProductRecord, Store, StoreError, VariantRecord};
use thiserror::Error;

/// Errors loading a seed file.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read catalog seed: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog seed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("failed to store catalog seed: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub price: i64,
    #[serde(default)]
    pub kit_amount: i32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedAdditional {
    pub id: AdditionalId,
    pub name: String,
    pub price: i64,
}

/// Products, variants, and additionals to upsert.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub products: Vec<SeedProduct>,
    #[serde(default)]
    pub variants: Vec<SeedVariant>,
    #[serde(default)]
    pub additionals: Vec<SeedAdditional>,
}

impl CatalogSeed {
    /// Reads a seed from a JSON file.
    pub async fn load(path: &Path) -> Result<Self, SeedError> {
        let raw = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Upserts every row, products first so variants can reference them.
    pub async fn apply<S: Store + ?Sized>(&self, store: &S) -> Result<(), SeedError> {
        let now = Utc::now();
        for p in &self.products {
            store
                .upsert_product(ProductRecord {
                    id: p.id,
                    name: p.name.clone(),
                    image_url: p.image_url.clone(),
                    amount: p.amount,
                    updated_at: now,
                })
                .await?;
        }
        for v in &self.variants {
            store
                .upsert_variant(VariantRecord {
                    id: v.id,
                    product_id: v.product_id,
                    price_cents: v.price,
                    kit_amount: v.kit_amount,
                })
                .await?;
        }
        for a in &self.additionals {
            store
                .upsert_additional(AdditionalRecord {
                    id: a.id,
                    name: a.name.clone(),
                    price_cents: a.price,
                })
                .await?;
        }

        tracing::info!(
            products = self.products.len(),
            variants = self.variants.len(),
            additionals = self.additionals.len(),
            "catalog seed applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store::InMemoryStore;

    #[tokio::test]
    async fn applies_every_row() {
        let seed: CatalogSeed = serde_json::from_str(
            r#"{
                "products": [{"id": 1, "name": "Pizza", "imageUrl": "/p.png", "amount": 5}],
                "variants": [{"id": 11, "productId": 1, "price": 100, "kitAmount": 1}],
                "additionals": [{"id": 21, "name": "Cheese", "price": 20}]
            }"#,
        )
        .unwrap();
        let store = InMemoryStore::new();

        seed.apply(&store).await.unwrap();

        let product = store.get_product(ProductId::new(1)).await.unwrap().unwrap();
        assert_eq!(product.amount, 5);
        assert_eq!(
            store
                .get_variant(VariantId::new(11))
                .await
                .unwrap()
                .unwrap()
                .kit_amount,
            1
        );
        assert!(store.get_additional(AdditionalId::new(21)).await.unwrap().is_some());
    }
}

//! Row-shaped records exchanged with the store.

use chrono::{DateTime, Utc};
use common::{AdditionalId, CartLineId, CartToken, OrderId, ProductId, UserId, VariantId};
use serde::{Deserialize, Serialize};

/// A product and its on-hand stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
    /// Current on-hand stock count. May be negative under back-order policy.
    pub amount: i64,
    pub updated_at: DateTime<Utc>,
}

impl ProductRecord {
    /// Creates a product row stamped with the current time.
    pub fn new(id: ProductId, name: impl Into<String>, amount: i64) -> Self {
        Self {
            id,
            name: name.into(),
            image_url: None,
            amount,
            updated_at: Utc::now(),
        }
    }

    /// Sets the image URL.
    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// A purchasable variant of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
    pub id: VariantId,
    pub product_id: ProductId,
    pub price_cents: i64,
    /// 0 = plain product, 1 = kit eligible for additionals.
    pub kit_amount: i32,
}

/// A priced add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalRecord {
    pub id: AdditionalId,
    pub name: String,
    pub price_cents: i64,
}

/// One line of a stored cart. Prices are never stored on the line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineRecord {
    pub id: CartLineId,
    pub variant_id: VariantId,
    pub additional_ids: Vec<AdditionalId>,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
}

/// A stored cart with its lines in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartRecord {
    pub token: CartToken,
    pub user_id: Option<UserId>,
    pub lines: Vec<CartLineRecord>,
    pub total_amount_cents: i64,
    /// Bumped on every write; guards checkout and cart saves.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl CartRecord {
    /// Creates an empty cart at version 0.
    pub fn empty(token: CartToken) -> Self {
        Self {
            token,
            user_id: None,
            lines: Vec::new(),
            total_amount_cents: 0,
            version: 0,
            updated_at: Utc::now(),
        }
    }
}

/// A persisted order. `items` is the serialized snapshot document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub cart_token: CartToken,
    pub status: String,
    pub total_amount_cents: i64,
    pub items: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub comment: Option<String>,
    /// Bumped on every status write; guards status transitions.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Decrement `quantity` units from a product's stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// What to do when a decrement would take stock below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockPolicy {
    /// Fail the whole transition.
    #[default]
    Reject,
    /// Let stock go negative (back-order).
    AllowNegative,
}

impl std::str::FromStr for StockPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(StockPolicy::Reject),
            "allow-negative" | "allow_negative" | "backorder" => Ok(StockPolicy::AllowNegative),
            other => Err(format!("unknown stock policy: {other}")),
        }
    }
}

/// A compare-and-swap status write, optionally carrying stock decrements
/// that must commit or roll back together with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub order_id: OrderId,
    pub expected_version: i64,
    pub status: String,
    pub adjustments: Vec<StockAdjustment>,
    pub policy: StockPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_policy_parses_known_names() {
        assert_eq!("reject".parse::<StockPolicy>(), Ok(StockPolicy::Reject));
        assert_eq!(
            "Allow-Negative".parse::<StockPolicy>(),
            Ok(StockPolicy::AllowNegative)
        );
        assert!("clamp".parse::<StockPolicy>().is_err());
    }

    #[test]
    fn empty_cart_starts_at_version_zero() {
        let cart = CartRecord::empty(CartToken::new("t"));
        assert_eq!(cart.version, 0);
        assert!(cart.lines.is_empty());
        assert_eq!(cart.total_amount_cents, 0);
    }
}

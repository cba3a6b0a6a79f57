//! Cart Snapshot Serializer.
//!
//! An order keeps its line items by value in a versioned JSON document so
//! later catalog edits never change a historical order. The current writer
//! emits:
//!
//! ```text
//! { "schema": "v1",
//!   "items": [ { id, quantity, productItemId,
//!                productItem?: { id, price, productId, product?: { id, name, imageUrl } },
//!                additionals?: [ { id, name, price } ] } ] }
//! ```
//!
//! Documents written before the schema tag existed are a bare `items` array
//! and are still accepted.

use common::{AdditionalId, CartLineId, ProductId, VariantId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::catalog::ResolvedLine;
use crate::pricing::PricedLine;
use crate::value_objects::Money;

/// Schema tag written into every new snapshot.
pub const SCHEMA_VERSION: &str = "v1";

/// Errors raised while reading a stored snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The document is not valid JSON or has the wrong shape.
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),

    /// An object document without a `schema` tag.
    #[error("snapshot has no schema tag")]
    MissingSchema,

    /// A schema tag this build cannot read.
    #[error("unsupported snapshot schema: {0}")]
    UnsupportedSchema(String),

    /// A line parsed but lacks data needed to use it.
    #[error("line {line}: {reason}")]
    InvalidLine { line: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrozenProduct {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrozenVariant {
    pub id: VariantId,
    pub price: Money,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<FrozenProduct>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrozenAdditional {
    pub id: AdditionalId,
    pub name: String,
    pub price: Money,
}

/// One cart line frozen by value at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrozenLineItem {
    pub id: CartLineId,
    pub quantity: u32,
    pub product_item_id: VariantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_item: Option<FrozenVariant>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additionals: Vec<FrozenAdditional>,
}

impl From<&ResolvedLine> for FrozenLineItem {
    fn from(line: &ResolvedLine) -> Self {
        let product = &line.variant.product;
        FrozenLineItem {
            id: line.line_id,
            quantity: line.quantity,
            product_item_id: line.variant.id,
            product_item: Some(FrozenVariant {
                id: line.variant.id,
                price: line.variant.price,
                product_id: Some(product.id),
                product: Some(FrozenProduct {
                    id: product.id,
                    name: product.name.clone(),
                    image_url: product.image_url.clone(),
                }),
            }),
            additionals: line
                .additionals
                .iter()
                .map(|a| FrozenAdditional {
                    id: a.id,
                    name: a.name.clone(),
                    price: a.price,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
struct Document<'a> {
    schema: &'a str,
    items: &'a [FrozenLineItem],
}

/// The frozen line items of one order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderSnapshot {
    items: Vec<FrozenLineItem>,
}

impl OrderSnapshot {
    /// Freezes resolved cart lines.
    pub fn freeze(lines: &[ResolvedLine]) -> Self {
        Self {
            items: lines.iter().map(FrozenLineItem::from).collect(),
        }
    }

    /// Wraps already frozen items.
    pub fn from_items(items: Vec<FrozenLineItem>) -> Self {
        Self { items }
    }

    /// Serializes the snapshot with the current schema tag.
    pub fn to_document(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&Document {
            schema: SCHEMA_VERSION,
            items: &self.items,
        })
    }

    /// Parses a stored document, tagged or legacy.
    pub fn parse(document: &str) -> Result<Self, SnapshotError> {
        let value: Value = serde_json::from_str(document)?;
        let items = match value {
            Value::Object(mut fields) => {
                match fields.remove("schema") {
                    Some(Value::String(tag)) if tag == SCHEMA_VERSION => {}
                    Some(Value::String(tag)) => return Err(SnapshotError::UnsupportedSchema(tag)),
                    Some(other) => return Err(SnapshotError::UnsupportedSchema(other.to_string())),
                    None => return Err(SnapshotError::MissingSchema),
                }
                let items = fields.remove("items").unwrap_or(Value::Array(Vec::new()));
                serde_json::from_value(items)?
            }
            legacy => serde_json::from_value(legacy)?,
        };
        Ok(Self { items })
    }

    /// Returns the frozen items.
    pub fn items(&self) -> &[FrozenLineItem] {
        &self.items
    }

    /// Returns true if the snapshot has no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Checks every line carries what fulfillment and reporting need and
    /// flattens them. Fails on the first bad line.
    pub fn validated_lines(&self) -> Result<Vec<ValidatedLine>, SnapshotError> {
        self.items
            .iter()
            .enumerate()
            .map(|(index, item)| ValidatedLine::try_from_item(index, item))
            .collect()
    }
}

/// A snapshot line known to reference a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedLine {
    pub product_id: ProductId,
    /// Product name as frozen, or a placeholder for legacy lines without one.
    pub product_name: String,
    pub image_url: Option<String>,
    pub variant_id: VariantId,
    pub unit_price: Money,
    pub additional_prices: Vec<Money>,
    pub quantity: u32,
}

impl ValidatedLine {
    fn try_from_item(index: usize, item: &FrozenLineItem) -> Result<Self, SnapshotError> {
        let invalid = |reason: &str| SnapshotError::InvalidLine {
            line: index,
            reason: reason.to_string(),
        };

        if item.quantity == 0 {
            return Err(invalid("quantity must be positive"));
        }
        let variant = item
            .product_item
            .as_ref()
            .ok_or_else(|| invalid("missing productItem"))?;
        let product_id = variant
            .product_id
            .or_else(|| variant.product.as_ref().map(|p| p.id))
            .ok_or_else(|| invalid("missing productItem.productId"))?;

        let (product_name, image_url) = match &variant.product {
            Some(product) => (product.name.clone(), product.image_url.clone()),
            None => (format!("Product {product_id}"), None),
        };

        Ok(Self {
            product_id,
            product_name,
            image_url,
            variant_id: variant.id,
            unit_price: variant.price,
            additional_prices: item.additionals.iter().map(|a| a.price).collect(),
            quantity: item.quantity,
        })
    }
}

impl PricedLine for ValidatedLine {
    fn base_price(&self) -> Money {
        self.unit_price
    }

    fn additional_prices(&self) -> impl Iterator<Item = Money> + '_ {
        self.additional_prices.iter().copied()
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }
}

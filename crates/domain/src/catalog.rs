//! Catalog read model: resolves cart lines against current catalog rows.

use common::{AdditionalId, CartLineId, CartToken, ProductId, VariantId};
use serde::Serialize;
use store::{CartLineRecord, CartRecord, Store};

use crate::error::DomainError;
use crate::pricing::{self, PricedLine};
use crate::value_objects::Money;

/// `kit_amount` value marking a variant that accepts additionals.
pub const KIT: i32 = 1;

/// Product fields denormalized onto a resolved line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub image_url: Option<String>,
}

/// A variant with its current price and owning product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantView {
    pub id: VariantId,
    pub price: Money,
    pub kit_amount: i32,
    pub product: ProductView,
}

impl VariantView {
    /// Returns true if the variant accepts additionals.
    pub fn is_kit(&self) -> bool {
        self.kit_amount == KIT
    }
}

/// An additional with its current price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalView {
    pub id: AdditionalId,
    pub name: String,
    pub price: Money,
}

/// A cart line with every price looked up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLine {
    pub line_id: CartLineId,
    pub quantity: u32,
    pub variant: VariantView,
    pub additionals: Vec<AdditionalView>,
    pub line_total: Money,
}

impl PricedLine for ResolvedLine {
    fn base_price(&self) -> Money {
        self.variant.price
    }

    fn additional_prices(&self) -> impl Iterator<Item = Money> + '_ {
        self.additionals.iter().map(|a| a.price)
    }

    fn quantity(&self) -> u32 {
        self.quantity
    }
}

/// A cart priced against the current catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCart {
    pub token: CartToken,
    pub lines: Vec<ResolvedLine>,
    pub total_amount: Money,
    /// Store version the lines were read at.
    #[serde(skip)]
    pub version: i64,
}

impl ResolvedCart {
    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Looks up a variant and its product.
pub async fn resolve_variant<S: Store + ?Sized>(
    store: &S,
    id: VariantId,
) -> Result<VariantView, DomainError> {
    let variant = store
        .get_variant(id)
        .await?
        .ok_or(DomainError::CatalogItemNotFound {
            kind: "variant",
            id: id.as_i64(),
        })?;
    let product = store.get_product(variant.product_id).await?.ok_or(
        DomainError::CatalogItemNotFound {
            kind: "product",
            id: variant.product_id.as_i64(),
        },
    )?;

    Ok(VariantView {
        id: variant.id,
        price: Money::from_cents(variant.price_cents),
        kit_amount: variant.kit_amount,
        product: ProductView {
            id: product.id,
            name: product.name,
            image_url: product.image_url,
        },
    })
}

/// Looks up an additional.
pub async fn resolve_additional<S: Store + ?Sized>(
    store: &S,
    id: AdditionalId,
) -> Result<AdditionalView, DomainError> {
    let additional = store
        .get_additional(id)
        .await?
        .ok_or(DomainError::CatalogItemNotFound {
            kind: "additional",
            id: id.as_i64(),
        })?;

    Ok(AdditionalView {
        id: additional.id,
        name: additional.name,
        price: Money::from_cents(additional.price_cents),
    })
}

async fn resolve_line<S: Store + ?Sized>(
    store: &S,
    line: &CartLineRecord,
) -> Result<ResolvedLine, DomainError> {
    let variant = resolve_variant(store, line.variant_id).await?;
    let mut additionals = Vec::with_capacity(line.additional_ids.len());
    for id in &line.additional_ids {
        additionals.push(resolve_additional(store, *id).await?);
    }

    let mut resolved = ResolvedLine {
        line_id: line.id,
        quantity: line.quantity,
        variant,
        additionals,
        line_total: Money::zero(),
    };
    resolved.line_total = pricing::line_total(&resolved)?;
    Ok(resolved)
}

/// Prices every line of `cart` against the current catalog.
pub async fn resolve_cart<S: Store + ?Sized>(
    store: &S,
    cart: &CartRecord,
) -> Result<ResolvedCart, DomainError> {
    let mut lines = Vec::with_capacity(cart.lines.len());
    for line in &cart.lines {
        lines.push(resolve_line(store, line).await?);
    }
    let total_amount = pricing::cart_total(&lines)?;

    Ok(ResolvedCart {
        token: cart.token.clone(),
        lines,
        total_amount,
        version: cart.version,
    })
}

//! Order aggregate: a typed view over a stored order.

use chrono::{DateTime, Utc};
use common::{CartToken, OrderId, UserId};
use serde::Serialize;
use store::OrderRecord;

use crate::error::DomainError;
use crate::value_objects::{CustomerInfo, Money};

use super::{OrderSnapshot, OrderStatus, SnapshotError};

/// An order created from a cart.
///
/// The snapshot document is kept as stored and only parsed on demand, so an
/// unreadable snapshot never prevents loading the order itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub cart_token: CartToken,
    pub status: OrderStatus,
    pub total_amount: Money,
    #[serde(skip)]
    items: String,
    #[serde(flatten)]
    pub customer: CustomerInfo,
    #[serde(skip)]
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds the order from its stored row.
    pub fn from_record(record: OrderRecord) -> Result<Self, DomainError> {
        let status = record.status.parse::<OrderStatus>()?;
        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            cart_token: record.cart_token,
            status,
            total_amount: Money::from_cents(record.total_amount_cents),
            items: record.items,
            customer: CustomerInfo {
                full_name: record.full_name,
                email: record.email,
                phone: record.phone,
                address: record.address,
                comment: record.comment,
            },
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// Builds a new PENDING order row.
    pub(crate) fn new_record(
        user_id: UserId,
        cart_token: CartToken,
        total_amount: Money,
        snapshot: &OrderSnapshot,
        customer: CustomerInfo,
    ) -> Result<OrderRecord, DomainError> {
        let now = Utc::now();
        Ok(OrderRecord {
            id: OrderId::new(),
            user_id,
            cart_token,
            status: OrderStatus::Pending.as_str().to_string(),
            total_amount_cents: total_amount.cents(),
            items: snapshot.to_document()?,
            full_name: customer.full_name,
            email: customer.email,
            phone: customer.phone,
            address: customer.address,
            comment: customer.comment,
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the stored snapshot document.
    pub fn items_document(&self) -> &str {
        &self.items
    }

    /// Parses the stored snapshot.
    pub fn snapshot(&self) -> Result<OrderSnapshot, SnapshotError> {
        OrderSnapshot::parse(&self.items)
    }
}

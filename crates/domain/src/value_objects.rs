//! Value objects shared by the cart and order domains.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DomainError;

/// A money computation left the representable range of cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("amount exceeds the representable range")]
pub struct AmountOverflow;

/// Money amount in minor units of the store's single currency.
///
/// Integer arithmetic only; there is no currency conversion.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub const fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Sum of two amounts.
    pub fn checked_add(self, rhs: Money) -> Result<Money, AmountOverflow> {
        self.cents
            .checked_add(rhs.cents)
            .map(Money::from_cents)
            .ok_or(AmountOverflow)
    }

    /// Price of `quantity` units at this unit price.
    pub fn checked_multiply(self, quantity: u32) -> Result<Money, AmountOverflow> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
            .ok_or(AmountOverflow)
    }

    /// Sums `amounts`, failing on the first overflow.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Result<Money, AmountOverflow> {
        amounts.into_iter().try_fold(Money::zero(), Money::checked_add)
    }

    /// Arithmetic mean of `total` over `count` observations, rounded half
    /// away from zero to the nearest cent. Returns zero for an empty set.
    pub fn mean(total: Money, count: u64) -> Money {
        if count == 0 {
            return Money::zero();
        }
        let count = i128::from(count);
        let total = i128::from(total.cents);
        let rounded = (2 * total + total.signum() * count) / (2 * count);
        Money {
            cents: rounded as i64,
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

/// Customer and delivery details captured at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl CustomerInfo {
    /// Checks the minimum shape of every field.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.full_name.trim().chars().count() < 2 {
            return Err(DomainError::Validation(
                "full name must have at least 2 characters".to_string(),
            ));
        }
        let email = self.email.trim();
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && domain.contains('.') => {}
            _ => {
                return Err(DomainError::Validation(format!(
                    "invalid email address: {email}"
                )));
            }
        }
        if self.phone.trim().chars().count() < 10 {
            return Err(DomainError::Validation(
                "phone number must have at least 10 characters".to_string(),
            ));
        }
        if self.address.trim().chars().count() < 5 {
            return Err(DomainError::Validation(
                "delivery address must have at least 5 characters".to_string(),
            ));
        }
        Ok(())
    }
}

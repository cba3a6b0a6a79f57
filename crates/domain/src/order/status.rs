//! Order status state machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// PENDING ──┬──► SUCCEDED   (decrements stock)
///           └──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order placed, awaiting fulfillment.
    #[default]
    #[serde(rename = "PENDING")]
    Pending,

    /// Order fulfilled (terminal state). The wire spelling is kept as stored.
    #[serde(rename = "SUCCEDED", alias = "SUCCEEDED")]
    Succeeded,

    /// Order was cancelled (terminal state).
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

/// Work that must commit atomically with a status write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    None,
    /// Decrement stock for every product in the order snapshot.
    DecrementStock,
}

/// Outcome of looking up `(current, requested)` in the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Already in the requested status; succeed without writing.
    Unchanged,
    /// Write the new status together with the side effect.
    Apply {
        to: OrderStatus,
        side_effect: SideEffect,
    },
    /// Not allowed.
    Rejected,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 3] = [
        OrderStatus::Pending,
        OrderStatus::Succeeded,
        OrderStatus::Cancelled,
    ];

    /// Looks up the transition from `self` to `requested`.
    pub fn transition(self, requested: OrderStatus) -> Transition {
        use OrderStatus::*;

        match (self, requested) {
            (current, requested) if current == requested => Transition::Unchanged,
            (Pending, Succeeded) => Transition::Apply {
                to: Succeeded,
                side_effect: SideEffect::DecrementStock,
            },
            (Pending, Cancelled) => Transition::Apply {
                to: Cancelled,
                side_effect: SideEffect::None,
            },
            (Succeeded | Cancelled, _) | (_, Pending) => Transition::Rejected,
        }
    }

    /// Like [`OrderStatus::transition`], but a rejection becomes an error.
    pub fn check_transition(self, requested: OrderStatus) -> Result<Transition, DomainError> {
        match self.transition(requested) {
            Transition::Rejected => Err(DomainError::InvalidTransition {
                from: self,
                to: requested,
            }),
            allowed => Ok(allowed),
        }
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Succeeded | OrderStatus::Cancelled)
    }

    /// Returns the status name as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Succeeded => "SUCCEDED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "SUCCEDED" | "SUCCEEDED" => Ok(OrderStatus::Succeeded),
            "CANCELLED" | "CANCELED" => Ok(OrderStatus::Cancelled),
            _ => Err(DomainError::UnknownStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_same_status_is_unchanged() {
        for status in OrderStatus::ALL {
            assert_eq!(status.transition(status), Transition::Unchanged);
        }
    }

    #[test]
    fn test_only_fulfillment_decrements_stock() {
        assert_eq!(
            OrderStatus::Pending.transition(OrderStatus::Succeeded),
            Transition::Apply {
                to: OrderStatus::Succeeded,
                side_effect: SideEffect::DecrementStock,
            }
        );
        assert_eq!(
            OrderStatus::Pending.transition(OrderStatus::Cancelled),
            Transition::Apply {
                to: OrderStatus::Cancelled,
                side_effect: SideEffect::None,
            }
        );
    }

    #[test]
    fn test_terminal_states_reject_moves() {
        assert_eq!(
            OrderStatus::Cancelled.transition(OrderStatus::Succeeded),
            Transition::Rejected
        );
        assert_eq!(
            OrderStatus::Succeeded.transition(OrderStatus::Cancelled),
            Transition::Rejected
        );
        assert_eq!(
            OrderStatus::Succeeded.transition(OrderStatus::Pending),
            Transition::Rejected
        );
        assert!(matches!(
            OrderStatus::Cancelled.check_transition(OrderStatus::Pending),
            Err(DomainError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_is_terminal() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Succeeded.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Succeeded).unwrap(),
            "\"SUCCEDED\""
        );
        let alias: OrderStatus = serde_json::from_str("\"SUCCEEDED\"").unwrap();
        assert_eq!(alias, OrderStatus::Succeeded);
        assert_eq!("cancelled".parse::<OrderStatus>().unwrap(), OrderStatus::Cancelled);
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }
}

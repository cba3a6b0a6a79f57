//! Order service: status transitions with their inventory side effect.

use common::OrderId;
use store::{StatusChange, StockPolicy, Store, StoreError};

use crate::error::DomainError;

use super::{Order, OrderStatus, SideEffect, Transition, plan_adjustments};

/// How many times a transition is re-evaluated after losing a race.
pub const MAX_TRANSITION_ATTEMPTS: usize = 3;

/// Result of a status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub order: Order,
    /// False when the order was already in the requested status.
    pub changed: bool,
}

/// Service for reading orders and moving them through their lifecycle.
///
/// The status write and any stock decrements go to the store as one
/// compare-and-swap on the order version, so an order can be fulfilled (and
/// its stock decremented) at most once no matter how many callers race.
pub struct OrderService<S: Store> {
    store: S,
    policy: StockPolicy,
}

impl<S: Store> OrderService<S> {
    /// Creates a new order service that rejects oversells.
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: StockPolicy::default(),
        }
    }

    /// Sets the oversell policy.
    pub fn with_stock_policy(mut self, policy: StockPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the oversell policy.
    pub fn stock_policy(&self) -> StockPolicy {
        self.policy
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DomainError> {
        let record = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))?;
        Order::from_record(record)
    }

    /// Moves an order to `requested`.
    ///
    /// Requesting the current status succeeds without side effects. Entering
    /// SUCCEDED decrements stock for every product in the snapshot in the
    /// same unit of work; an unreadable snapshot aborts the transition.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        requested: OrderStatus,
    ) -> Result<StatusUpdate, DomainError> {
        for attempt in 1..=MAX_TRANSITION_ATTEMPTS {
            let order = self.get_order(order_id).await?;

            let (to, side_effect) = match order.status.transition(requested) {
                Transition::Unchanged => {
                    tracing::debug!(status = %order.status, "status unchanged");
                    return Ok(StatusUpdate {
                        order,
                        changed: false,
                    });
                }
                Transition::Apply { to, side_effect } => (to, side_effect),
                Transition::Rejected => {
                    return Err(DomainError::InvalidTransition {
                        from: order.status,
                        to: requested,
                    });
                }
            };

            let adjustments = match side_effect {
                SideEffect::None => Vec::new(),
                SideEffect::DecrementStock => order
                    .snapshot()
                    .and_then(|snapshot| plan_adjustments(&snapshot))
                    .map_err(|source| DomainError::SnapshotUnparseable { order_id, source })?,
            };
            let decrements = adjustments.len();

            let change = StatusChange {
                order_id,
                expected_version: order.version,
                status: to.as_str().to_string(),
                adjustments,
                policy: self.policy,
            };

            match self.store.transition_order(change).await {
                Ok(record) => {
                    metrics::counter!("order_status_transitions_total", "to" => to.as_str())
                        .increment(1);
                    if decrements > 0 {
                        metrics::counter!("stock_decrements_total").increment(decrements as u64);
                    }
                    tracing::info!(
                        from = %order.status,
                        to = %to,
                        decrements,
                        "order status changed"
                    );
                    return Ok(StatusUpdate {
                        order: Order::from_record(record)?,
                        changed: true,
                    });
                }
                Err(StoreError::ConcurrencyConflict { .. }) => {
                    metrics::counter!("order_transition_conflicts_total").increment(1);
                    tracing::debug!(attempt, "order changed concurrently, re-evaluating");
                }
                Err(StoreError::NotFound { entity: "order", .. }) => {
                    return Err(DomainError::OrderNotFound(order_id));
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(attempts = MAX_TRANSITION_ATTEMPTS, "gave up on contended order");
        Err(DomainError::Conflict(format!(
            "order {order_id} is being updated concurrently, try again"
        )))
    }
}

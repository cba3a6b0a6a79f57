//! Checkout: turns a cart into a PENDING order.

use std::sync::Arc;
use std::time::Duration;

use common::{CartToken, UserId};
use store::{Store, StoreError};

use crate::catalog;
use crate::collaborators::{LogNotifier, OrderNotifier};
use crate::error::DomainError;
use crate::value_objects::CustomerInfo;

use super::{Order, OrderSnapshot};

/// Upper bound on a single notification attempt.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Service implementing `createOrder`.
pub struct CheckoutService<S: Store> {
    store: S,
    notifier: Arc<dyn OrderNotifier>,
    notify_timeout: Duration,
}

impl<S: Store> CheckoutService<S> {
    /// Creates a checkout service that logs order notifications.
    pub fn new(store: S) -> Self {
        Self {
            store,
            notifier: Arc::new(LogNotifier),
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    /// Replaces the notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn OrderNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Sets how long a notification may run before it is abandoned.
    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Freezes the cart into a new order and empties the cart, atomically.
    ///
    /// Checks run in a fixed order: identity, customer fields, cart presence,
    /// cart contents. Nothing is written unless all pass. The confirmation
    /// notification runs in the background and never affects the result.
    #[tracing::instrument(skip(self, customer), fields(cart = %cart_token))]
    pub async fn create_order(
        &self,
        cart_token: &CartToken,
        customer: CustomerInfo,
        identity: Option<UserId>,
    ) -> Result<Order, DomainError> {
        let user_id = identity.ok_or(DomainError::Unauthenticated)?;
        customer.validate()?;

        let cart = self
            .store
            .get_cart(cart_token)
            .await?
            .ok_or_else(|| DomainError::CartNotFound(cart_token.clone()))?;
        if cart.lines.is_empty() {
            return Err(DomainError::EmptyCart);
        }

        let resolved = catalog::resolve_cart(&self.store, &cart).await?;
        if resolved.total_amount.is_zero() {
            return Err(DomainError::EmptyCart);
        }

        let snapshot = OrderSnapshot::freeze(&resolved.lines);
        let record = Order::new_record(
            user_id,
            cart_token.clone(),
            resolved.total_amount,
            &snapshot,
            customer,
        )?;

        self.store
            .place_order(record.clone(), cart_token, resolved.version)
            .await
            .map_err(|e| match e {
                StoreError::ConcurrencyConflict { .. } => DomainError::Conflict(
                    "cart changed during checkout, review it and try again".to_string(),
                ),
                StoreError::NotFound { .. } => DomainError::CartNotFound(cart_token.clone()),
                other => DomainError::Store(other),
            })?;

        let order = Order::from_record(record)?;
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            total = %order.total_amount,
            lines = snapshot.items().len(),
            "order created"
        );

        self.notify(order.clone());
        Ok(order)
    }

    fn notify(&self, order: Order) {
        let notifier = Arc::clone(&self.notifier);
        let timeout = self.notify_timeout;
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, notifier.order_created(&order)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(order_id = %order.id, error = %e, "order notification failed");
                }
                Err(_) => {
                    tracing::error!(order_id = %order.id, "order notification timed out");
                }
            }
        });
    }
}

//! Shared application state.

use std::sync::Arc;

use domain::{
    CartService, CheckoutService, IdentityResolver, InMemorySessions, LogNotifier, OrderNotifier,
    OrderService,
};
use reports::ReportEngine;
use store::{StockPolicy, Store};

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub carts: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderService<S>,
    pub reports: ReportEngine<S>,
    pub identity: Arc<dyn IdentityResolver>,
    pub store: S,
}

/// Builder for [`AppState`].
pub struct AppStateBuilder<S: Store> {
    store: S,
    policy: StockPolicy,
    identity: Arc<dyn IdentityResolver>,
    notifier: Arc<dyn OrderNotifier>,
}

impl<S: Store + Clone> AppStateBuilder<S> {
    /// Starts from a store with default collaborators: no sessions and a
    /// logging notifier.
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: StockPolicy::default(),
            identity: Arc::new(InMemorySessions::new()),
            notifier: Arc::new(LogNotifier),
        }
    }

    /// Sets the oversell policy.
    pub fn stock_policy(mut self, policy: StockPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the identity resolver.
    pub fn identity(mut self, identity: Arc<dyn IdentityResolver>) -> Self {
        self.identity = identity;
        self
    }

    /// Sets the order notifier.
    pub fn notifier(mut self, notifier: Arc<dyn OrderNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Wires the services.
    pub fn build(self) -> Arc<AppState<S>> {
        Arc::new(AppState {
            carts: CartService::new(self.store.clone()),
            checkout: CheckoutService::new(self.store.clone()).with_notifier(self.notifier),
            orders: OrderService::new(self.store.clone()).with_stock_policy(self.policy),
            reports: ReportEngine::new(self.store.clone()),
            identity: self.identity,
            store: self.store,
        })
    }
}

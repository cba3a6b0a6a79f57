//! External collaborators consumed by the order core.
//!
//! Session issuance and email delivery live outside this crate; these traits
//! are the seams, with small in-process implementations for wiring and tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{OrderId, UserId};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::order::Order;

/// Resolves a session credential to a user.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Returns the user for `session`, or `None` if it is missing or unknown.
    async fn resolve(&self, session: Option<&str>) -> Option<UserId>;
}

/// Fixed session table.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessions {
    sessions: Arc<RwLock<HashMap<String, UserId>>>,
}

impl InMemorySessions {
    /// Creates an empty session table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session table from `(token, user)` pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, UserId)>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(pairs.into_iter().collect())),
        }
    }

    /// Registers a session.
    pub async fn insert(&self, token: impl Into<String>, user: UserId) {
        self.sessions.write().await.insert(token.into(), user);
    }
}

#[async_trait]
impl IdentityResolver for InMemorySessions {
    async fn resolve(&self, session: Option<&str>) -> Option<UserId> {
        let session = session?.trim();
        if session.is_empty() {
            return None;
        }
        self.sessions.read().await.get(session).copied()
    }
}

/// Error returned by a notifier.
#[derive(Debug, Error)]
#[error("notification failed: {0}")]
pub struct NotificationError(pub String);

/// Outbound notification sent after an order is created.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    /// Called once per created order, after it is committed.
    async fn order_created(&self, order: &Order) -> Result<(), NotificationError>;
}

/// Notifier that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl OrderNotifier for LogNotifier {
    async fn order_created(&self, order: &Order) -> Result<(), NotificationError> {
        tracing::info!(
            order_id = %order.id,
            email = %order.customer.email,
            total = %order.total_amount,
            "order confirmation queued"
        );
        Ok(())
    }
}

/// Notifier that remembers what it was asked to send.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<OrderId>>>,
    attempts: Arc<AtomicUsize>,
    finished: Arc<AtomicUsize>,
    fail: Arc<RwLock<bool>>,
    delay: Duration,
}

impl RecordingNotifier {
    /// Creates a notifier that succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every notification sleep for `delay` before completing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Makes subsequent notifications fail.
    pub async fn set_fail(&self, fail: bool) {
        *self.fail.write().await = fail;
    }

    /// Returns the ids of orders notified so far.
    pub async fn sent(&self) -> Vec<OrderId> {
        self.sent.read().await.clone()
    }

    /// Returns how many notifications were started, successful or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Waits up to a second for `count` attempts to finish, then returns
    /// the ids sent so far.
    pub async fn wait_for_attempts(&self, count: usize) -> Vec<OrderId> {
        for _ in 0..100 {
            if self.finished.load(Ordering::SeqCst) >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.sent().await
    }
}

#[async_trait]
impl OrderNotifier for RecordingNotifier {
    async fn order_created(&self, order: &Order) -> Result<(), NotificationError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = if *self.fail.read().await {
            Err(NotificationError("mail server unavailable".to_string()))
        } else {
            self.sent.write().await.push(order.id);
            Ok(())
        };
        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sessions_resolve_known_tokens_only() {
        let user = UserId::new();
        let sessions = InMemorySessions::from_pairs([("abc".to_string(), user)]);

        assert_eq!(sessions.resolve(Some("abc")).await, Some(user));
        assert_eq!(sessions.resolve(Some("nope")).await, None);
        assert_eq!(sessions.resolve(Some("  ")).await, None);
        assert_eq!(sessions.resolve(None).await, None);
    }

    #[tokio::test]
    async fn inserted_sessions_resolve() {
        let sessions = InMemorySessions::new();
        let user = UserId::new();
        sessions.insert("s1", user).await;
        assert_eq!(sessions.resolve(Some("s1")).await, Some(user));
    }
}

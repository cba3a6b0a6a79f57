use chrono::{DateTime, Utc};

use crate::OrderRecord;

/// Builder for filtering orders when scanning the store.
///
/// Results are always ordered by creation time, then id.
#[derive(Debug, Clone, Default)]
pub struct OrderQuery {
    /// Filter by persisted status name.
    pub status: Option<String>,

    /// Filter by orders created at or after this timestamp.
    pub created_from: Option<DateTime<Utc>>,

    /// Filter by orders created at or before this timestamp.
    pub created_to: Option<DateTime<Utc>>,

    /// Maximum number of orders to return.
    pub limit: Option<usize>,
}

impl OrderQuery {
    /// Creates a new empty query matching every order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for orders with a specific status.
    pub fn for_status(status: impl Into<String>) -> Self {
        Self {
            status: Some(status.into()),
            ..Default::default()
        }
    }

    /// Filters by status.
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Filters by orders created at or after this time.
    pub fn created_from(mut self, from: DateTime<Utc>) -> Self {
        self.created_from = Some(from);
        self
    }

    /// Filters by orders created at or before this time.
    pub fn created_to(mut self, to: DateTime<Utc>) -> Self {
        self.created_to = Some(to);
        self
    }

    /// Filters by an inclusive creation window.
    pub fn created_between(self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.created_from(from).created_to(to)
    }

    /// Limits the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if the order satisfies every filter of this query.
    ///
    /// The limit is not considered.
    pub fn matches(&self, order: &OrderRecord) -> bool {
        if let Some(ref status) = self.status
            && &order.status != status
        {
            return false;
        }
        if let Some(from) = self.created_from
            && order.created_at < from
        {
            return false;
        }
        if let Some(to) = self.created_to
            && order.created_at > to
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use common::{CartToken, OrderId, UserId};

    use super::*;

    fn order_at(status: &str, created_at: DateTime<Utc>) -> OrderRecord {
        OrderRecord {
            id: OrderId::new(),
            user_id: UserId::new(),
            cart_token: CartToken::new("token"),
            status: status.to_string(),
            total_amount_cents: 100,
            items: "[]".to_string(),
            full_name: "Jo Doe".to_string(),
            email: "jo@example.com".to_string(),
            phone: "+10000000000".to_string(),
            address: "1 Main St".to_string(),
            comment: None,
            version: 1,
            created_at,
            updated_at: created_at,
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        let order = order_at("PENDING", Utc::now());
        assert!(OrderQuery::new().matches(&order));
    }

    #[test]
    fn status_filter() {
        let query = OrderQuery::for_status("SUCCEDED");
        assert!(query.matches(&order_at("SUCCEDED", Utc::now())));
        assert!(!query.matches(&order_at("CANCELLED", Utc::now())));
    }

    #[test]
    fn created_window_is_inclusive() {
        let from = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let to = from + Duration::days(1);
        let query = OrderQuery::new().created_between(from, to);

        assert!(query.matches(&order_at("PENDING", from)));
        assert!(query.matches(&order_at("PENDING", to)));
        assert!(!query.matches(&order_at("PENDING", from - Duration::seconds(1))));
        assert!(!query.matches(&order_at("PENDING", to + Duration::seconds(1))));
    }

    #[test]
    fn builder_chain_sets_fields() {
        let query = OrderQuery::new().status("PENDING").limit(10);
        assert_eq!(query.status.as_deref(), Some("PENDING"));
        assert_eq!(query.limit, Some(10));
    }
}

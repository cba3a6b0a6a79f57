//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need a Docker daemon.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{AdditionalId, CartLineId, CartToken, OrderId, ProductId, UserId, VariantId};
use sqlx::PgPool;
use store::{
    AdditionalRecord, CartLineRecord, OrderQuery, OrderRecord, PostgresStore, ProductRecord,
    StatusChange, StockAdjustment, StockPolicy, Store, StoreError, StoreExt, VariantRecord,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_storefront_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query(
        "TRUNCATE TABLE orders, cart_line_additionals, cart_lines, carts, additionals, \
         product_variants, products",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

async fn seed_catalog(store: &PostgresStore) {
    store
        .upsert_product(ProductRecord::new(ProductId::new(1), "Pizza", 10).with_image("/p.png"))
        .await
        .unwrap();
    store
        .upsert_variant(VariantRecord {
            id: VariantId::new(11),
            product_id: ProductId::new(1),
            price_cents: 100,
            kit_amount: 1,
        })
        .await
        .unwrap();
    store
        .upsert_additional(AdditionalRecord {
            id: AdditionalId::new(21),
            name: "Cheese".to_string(),
            price_cents: 20,
        })
        .await
        .unwrap();
}

fn pending_order(token: &CartToken) -> OrderRecord {
    let now = Utc::now();
    OrderRecord {
        id: OrderId::new(),
        user_id: UserId::new(),
        cart_token: token.clone(),
        status: "PENDING".to_string(),
        total_amount_cents: 240,
        items: r#"{"schema":"v1","items":[]}"#.to_string(),
        full_name: "Jo Doe".to_string(),
        email: "jo@example.com".to_string(),
        phone: "+10000000000".to_string(),
        address: "1 Main St".to_string(),
        comment: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

fn fulfill(order: &OrderRecord, quantity: i64, policy: StockPolicy) -> StatusChange {
    StatusChange {
        order_id: order.id,
        expected_version: order.version,
        status: "SUCCEDED".to_string(),
        adjustments: vec![StockAdjustment {
            product_id: ProductId::new(1),
            quantity,
        }],
        policy,
    }
}

#[tokio::test]
#[ignore = "requires docker"]
async fn catalog_round_trip() {
    let store = get_test_store().await;
    seed_catalog(&store).await;

    let variant = store.get_variant(VariantId::new(11)).await.unwrap().unwrap();
    assert_eq!(variant.price_cents, 100);
    assert_eq!(variant.kit_amount, 1);

    let product = store.get_product(ProductId::new(1)).await.unwrap().unwrap();
    assert_eq!(product.image_url.as_deref(), Some("/p.png"));
}

#[tokio::test]
#[ignore = "requires docker"]
async fn cart_lines_and_additionals_are_persisted_in_order() {
    let store = get_test_store().await;
    seed_catalog(&store).await;
    let token = CartToken::generate();

    let mut cart = store.get_or_create_cart(&token).await.unwrap();
    cart.lines.push(CartLineRecord {
        id: CartLineId::new(1),
        variant_id: VariantId::new(11),
        additional_ids: vec![AdditionalId::new(21)],
        quantity: 2,
        created_at: Utc::now(),
    });
    cart.total_amount_cents = 240;
    let saved = store.save_cart(cart).await.unwrap();
    assert_eq!(saved.version, 1);

    let loaded = store.get_cart(&token).await.unwrap().unwrap();
    assert_eq!(loaded.lines.len(), 1);
    assert_eq!(loaded.lines[0].additional_ids, vec![AdditionalId::new(21)]);
    assert_eq!(loaded.total_amount_cents, 240);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn oversized_line_quantity_is_rejected_before_writing() {
    let store = get_test_store().await;
    seed_catalog(&store).await;
    let token = CartToken::generate();

    let mut cart = store.get_or_create_cart(&token).await.unwrap();
    cart.lines.push(CartLineRecord {
        id: CartLineId::new(1),
        variant_id: VariantId::new(11),
        additional_ids: vec![],
        quantity: u32::MAX,
        created_at: Utc::now(),
    });

    let result = store.save_cart(cart).await;
    assert!(matches!(
        result,
        Err(StoreError::InvalidQuantity { quantity: u32::MAX, .. })
    ));

    let loaded = store.get_cart(&token).await.unwrap().unwrap();
    assert!(loaded.lines.is_empty());
    assert_eq!(loaded.version, 0);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn refresh_cart_total_keeps_the_version() {
    let store = get_test_store().await;
    let token = CartToken::generate();
    let cart = store.get_or_create_cart(&token).await.unwrap();

    assert!(store.refresh_cart_total(&token, cart.version, 500).await.unwrap());
    assert!(!store.refresh_cart_total(&token, cart.version + 1, 900).await.unwrap());

    let loaded = store.get_cart(&token).await.unwrap().unwrap();
    assert_eq!(loaded.total_amount_cents, 500);
    assert_eq!(loaded.version, cart.version);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn place_order_clears_cart_and_rejects_stale_version() {
    let store = get_test_store().await;
    seed_catalog(&store).await;
    let token = CartToken::generate();
    let cart = store.get_or_create_cart(&token).await.unwrap();

    store
        .place_order(pending_order(&token), &token, cart.version)
        .await
        .unwrap();

    let stale = store
        .place_order(pending_order(&token), &token, cart.version)
        .await;
    assert!(matches!(
        stale,
        Err(StoreError::ConcurrencyConflict { .. })
    ));

    let orders = store.collect_orders(OrderQuery::new()).await.unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn concurrent_fulfillment_decrements_once() {
    let store = get_test_store().await;
    seed_catalog(&store).await;
    let token = CartToken::generate();
    let cart = store.get_or_create_cart(&token).await.unwrap();
    let order = pending_order(&token);
    store
        .place_order(order.clone(), &token, cart.version)
        .await
        .unwrap();

    let first = store.clone();
    let second = store.clone();
    let change = fulfill(&order, 2, StockPolicy::Reject);
    let change2 = change.clone();
    let (a, b) = tokio::join!(
        async move { first.transition_order(change).await },
        async move { second.transition_order(change2).await },
    );

    assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
    let product = store.get_product(ProductId::new(1)).await.unwrap().unwrap();
    assert_eq!(product.amount, 8);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn reject_policy_rolls_back_status() {
    let store = get_test_store().await;
    seed_catalog(&store).await;
    let token = CartToken::generate();
    let cart = store.get_or_create_cart(&token).await.unwrap();
    let order = pending_order(&token);
    store
        .place_order(order.clone(), &token, cart.version)
        .await
        .unwrap();

    let result = store
        .transition_order(fulfill(&order, 50, StockPolicy::Reject))
        .await;
    assert!(matches!(result, Err(StoreError::InsufficientStock { .. })));

    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "PENDING");
    assert_eq!(stored.version, 1);
}

#[tokio::test]
#[ignore = "requires docker"]
async fn stream_orders_pages_through_date_window() {
    let store = get_test_store().await;
    let token = CartToken::generate();
    let now = Utc::now();

    for hours in 0..5 {
        let cart = store.get_or_create_cart(&token).await.unwrap();
        let mut order = pending_order(&token);
        order.created_at = now - Duration::hours(hours);
        store.place_order(order, &token, cart.version).await.unwrap();
    }

    let recent = store
        .collect_orders(OrderQuery::new().created_between(now - Duration::minutes(150), now))
        .await
        .unwrap();
    assert_eq!(recent.len(), 3);
    assert!(recent.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

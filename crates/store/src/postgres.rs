use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AdditionalId, CartLineId, CartToken, OrderId, ProductId, UserId, VariantId};
use futures_util::{StreamExt, stream};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    AdditionalRecord, CartLineRecord, CartRecord, OrderQuery, OrderRecord, ProductRecord, Result,
    StatusChange, StockPolicy, StoreError, VariantRecord,
    store::{OrderStream, Store, stored_quantity, validate_adjustments},
};

/// Number of orders fetched per round trip while streaming.
const ORDER_PAGE_SIZE: usize = 500;

const ORDER_COLUMNS: &str = "id, user_id, cart_token, status, total_amount, items, full_name, \
     email, phone, address, comment, version, created_at, updated_at";

/// PostgreSQL-backed store implementation.
///
/// Checkout and status transitions run inside a transaction. The order or
/// cart row is guarded by its version column, and stock moves through
/// `amount = amount - n` so concurrent fulfillments compose.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

/// Keyset cursor used to page through orders.
struct OrderPages {
    pool: PgPool,
    query: OrderQuery,
    after: Option<(DateTime<Utc>, Uuid)>,
    remaining: Option<usize>,
    finished: bool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: PgRow) -> Result<ProductRecord> {
        Ok(ProductRecord {
            id: ProductId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            image_url: row.try_get("image_url")?,
            amount: row.try_get("amount")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<OrderRecord> {
        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            cart_token: CartToken::new(row.try_get::<String, _>("cart_token")?),
            status: row.try_get("status")?,
            total_amount_cents: row.try_get("total_amount")?,
            items: row.try_get("items")?,
            full_name: row.try_get("full_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            address: row.try_get("address")?,
            comment: row.try_get("comment")?,
            version: row.try_get("version")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn load_cart(conn: &mut PgConnection, token: &CartToken) -> Result<Option<CartRecord>> {
        let Some(row) = sqlx::query(
            "SELECT token, user_id, total_amount, version, updated_at FROM carts WHERE token = $1",
        )
        .bind(token.as_str())
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let line_rows = sqlx::query(
            r#"
            SELECT id, variant_id, quantity, created_at
            FROM cart_lines
            WHERE cart_token = $1
            ORDER BY position ASC
            "#,
        )
        .bind(token.as_str())
        .fetch_all(&mut *conn)
        .await?;

        let additional_rows = sqlx::query(
            r#"
            SELECT line_id, additional_id
            FROM cart_line_additionals
            WHERE cart_token = $1
            ORDER BY line_id ASC, position ASC
            "#,
        )
        .bind(token.as_str())
        .fetch_all(&mut *conn)
        .await?;

        let mut lines = Vec::with_capacity(line_rows.len());
        for line in line_rows {
            let id: i64 = line.try_get("id")?;
            let mut additional_ids = Vec::new();
            for row in &additional_rows {
                if row.try_get::<i64, _>("line_id")? == id {
                    additional_ids.push(AdditionalId::new(row.try_get("additional_id")?));
                }
            }
            lines.push(CartLineRecord {
                id: CartLineId::new(id),
                variant_id: VariantId::new(line.try_get("variant_id")?),
                additional_ids,
                quantity: u32::try_from(line.try_get::<i32, _>("quantity")?).unwrap_or(0),
                created_at: line.try_get("created_at")?,
            });
        }

        Ok(Some(CartRecord {
            token: CartToken::new(row.try_get::<String, _>("token")?),
            user_id: row.try_get::<Option<Uuid>, _>("user_id")?.map(UserId::from_uuid),
            lines,
            total_amount_cents: row.try_get("total_amount")?,
            version: row.try_get("version")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    /// Distinguishes a missing cart from a stale version after a guarded write
    /// touched no rows.
    async fn cart_write_failure(
        conn: &mut PgConnection,
        token: &CartToken,
        expected: i64,
    ) -> Result<StoreError> {
        let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM carts WHERE token = $1")
            .bind(token.as_str())
            .fetch_optional(&mut *conn)
            .await?;

        Ok(match actual {
            Some(actual) => StoreError::conflict("cart", token, expected, actual),
            None => StoreError::not_found("cart", token),
        })
    }

    async fn fetch_order_page(
        pool: &PgPool,
        query: &OrderQuery,
        after: Option<(DateTime<Utc>, Uuid)>,
        page_size: usize,
    ) -> Result<Vec<OrderRecord>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE ($1::text IS NULL OR status = $1)
              AND ($2::timestamptz IS NULL OR created_at >= $2)
              AND ($3::timestamptz IS NULL OR created_at <= $3)
              AND ($4::timestamptz IS NULL OR (created_at, id) > ($4, $5::uuid))
            ORDER BY created_at ASC, id ASC
            LIMIT $6
            "#
        );

        let rows = sqlx::query(&sql)
            .bind(query.status.as_deref())
            .bind(query.created_from)
            .bind(query.created_to)
            .bind(after.map(|(created_at, _)| created_at))
            .bind(after.map(|(_, id)| id))
            .bind(page_size as i64)
            .fetch_all(pool)
            .await?;
        tracing::debug!(rows = rows.len(), page_size, resumed = after.is_some(), "fetched order page");

        rows.into_iter().map(Self::row_to_order).collect()
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn upsert_product(&self, product: ProductRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, image_url, amount, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                image_url = EXCLUDED.image_url,
                amount = EXCLUDED.amount,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(product.id.as_i64())
        .bind(&product.name)
        .bind(&product.image_url)
        .bind(product.amount)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_variant(&self, variant: VariantRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO product_variants (id, product_id, price, kit_amount)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                product_id = EXCLUDED.product_id,
                price = EXCLUDED.price,
                kit_amount = EXCLUDED.kit_amount
            "#,
        )
        .bind(variant.id.as_i64())
        .bind(variant.product_id.as_i64())
        .bind(variant.price_cents)
        .bind(variant.kit_amount)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::not_found("product", variant.product_id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn upsert_additional(&self, additional: AdditionalRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO additionals (id, name, price)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price
            "#,
        )
        .bind(additional.id.as_i64())
        .bind(&additional.name)
        .bind(additional.price_cents)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            "SELECT id, name, image_url, amount, updated_at FROM products WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn list_products(&self) -> Result<Vec<ProductRecord>> {
        let rows = sqlx::query(
            "SELECT id, name, image_url, amount, updated_at FROM products ORDER BY name ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_product).collect()
    }

    async fn get_variant(&self, id: VariantId) -> Result<Option<VariantRecord>> {
        let row = sqlx::query(
            "SELECT id, product_id, price, kit_amount FROM product_variants WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(VariantRecord {
                id: VariantId::new(row.try_get("id")?),
                product_id: ProductId::new(row.try_get("product_id")?),
                price_cents: row.try_get("price")?,
                kit_amount: row.try_get("kit_amount")?,
            })),
            None => Ok(None),
        }
    }

    async fn get_additional(&self, id: AdditionalId) -> Result<Option<AdditionalRecord>> {
        let row = sqlx::query("SELECT id, name, price FROM additionals WHERE id = $1")
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(AdditionalRecord {
                id: AdditionalId::new(row.try_get("id")?),
                name: row.try_get("name")?,
                price_cents: row.try_get("price")?,
            })),
            None => Ok(None),
        }
    }

    async fn get_or_create_cart(&self, token: &CartToken) -> Result<CartRecord> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO carts (token) VALUES ($1) ON CONFLICT (token) DO NOTHING")
            .bind(token.as_str())
            .execute(&mut *tx)
            .await?;

        let cart = Self::load_cart(&mut tx, token)
            .await?
            .ok_or_else(|| StoreError::not_found("cart", token))?;

        tx.commit().await?;
        Ok(cart)
    }

    async fn get_cart(&self, token: &CartToken) -> Result<Option<CartRecord>> {
        let mut tx = self.pool.begin().await?;
        let cart = Self::load_cart(&mut tx, token).await?;
        tx.commit().await?;
        Ok(cart)
    }

    #[tracing::instrument(skip(self, cart), fields(token = %cart.token, version = cart.version))]
    async fn save_cart(&self, mut cart: CartRecord) -> Result<CartRecord> {
        let quantities = cart
            .lines
            .iter()
            .map(stored_quantity)
            .collect::<Result<Vec<i32>>>()?;

        let mut tx = self.pool.begin().await?;

        let updated: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            UPDATE carts
            SET user_id = $1, total_amount = $2, version = version + 1, updated_at = NOW()
            WHERE token = $3 AND version = $4
            RETURNING version, updated_at
            "#,
        )
        .bind(cart.user_id.map(|id| id.as_uuid()))
        .bind(cart.total_amount_cents)
        .bind(cart.token.as_str())
        .bind(cart.version)
        .fetch_optional(&mut *tx)
        .await?;

        let Some((version, updated_at)) = updated else {
            return Err(Self::cart_write_failure(&mut tx, &cart.token, cart.version).await?);
        };

        sqlx::query("DELETE FROM cart_lines WHERE cart_token = $1")
            .bind(cart.token.as_str())
            .execute(&mut *tx)
            .await?;

        for (position, (line, quantity)) in cart.lines.iter().zip(quantities).enumerate() {
            sqlx::query(
                r#"
                INSERT INTO cart_lines (cart_token, id, variant_id, quantity, position, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(cart.token.as_str())
            .bind(line.id.as_i64())
            .bind(line.variant_id.as_i64())
            .bind(quantity)
            .bind(position as i32)
            .bind(line.created_at)
            .execute(&mut *tx)
            .await?;

            for (additional_position, additional_id) in line.additional_ids.iter().enumerate() {
                sqlx::query(
                    r#"
                    INSERT INTO cart_line_additionals (cart_token, line_id, additional_id, position)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(cart.token.as_str())
                .bind(line.id.as_i64())
                .bind(additional_id.as_i64())
                .bind(additional_position as i32)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        cart.version = version;
        cart.updated_at = updated_at;
        Ok(cart)
    }

    async fn refresh_cart_total(
        &self,
        token: &CartToken,
        expected_version: i64,
        total_amount_cents: i64,
    ) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE carts SET total_amount = $1 WHERE token = $2 AND version = $3",
        )
        .bind(total_amount_cents)
        .bind(token.as_str())
        .bind(expected_version)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(updated > 0)
    }

    #[tracing::instrument(
        skip_all,
        fields(order_id = %order.id, cart_token = %cart_token, expected_cart_version = expected_cart_version)
    )]
    async fn place_order(
        &self,
        order: OrderRecord,
        cart_token: &CartToken,
        expected_cart_version: i64,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let cleared = sqlx::query(
            r#"
            UPDATE carts
            SET total_amount = 0, version = version + 1, updated_at = NOW()
            WHERE token = $1 AND version = $2
            "#,
        )
        .bind(cart_token.as_str())
        .bind(expected_cart_version)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if cleared == 0 {
            return Err(
                Self::cart_write_failure(&mut tx, cart_token, expected_cart_version).await?,
            );
        }

        sqlx::query("DELETE FROM cart_lines WHERE cart_token = $1")
            .bind(cart_token.as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, cart_token, status, total_amount, items, full_name,
                                email, phone, address, comment, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.cart_token.as_str())
        .bind(&order.status)
        .bind(order.total_amount_cents)
        .bind(&order.items)
        .bind(&order.full_name)
        .bind(&order.email)
        .bind(&order.phone)
        .bind(&order.address)
        .bind(&order.comment)
        .bind(order.version)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::conflict("order", order.id, 0, order.version);
            }
            StoreError::Database(e)
        })?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<OrderRecord>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    #[tracing::instrument(
        skip(self, change),
        fields(order_id = %change.order_id, status = %change.status, adjustments = change.adjustments.len())
    )]
    async fn transition_order(&self, change: StatusChange) -> Result<OrderRecord> {
        validate_adjustments(&change.adjustments)?;

        let mut tx = self.pool.begin().await?;

        // Row lock on the order serializes concurrent transitions.
        let current: Option<i64> =
            sqlx::query_scalar("SELECT version FROM orders WHERE id = $1 FOR UPDATE")
                .bind(change.order_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;

        let current = current.ok_or_else(|| StoreError::not_found("order", change.order_id))?;
        if current != change.expected_version {
            return Err(StoreError::conflict(
                "order",
                change.order_id,
                change.expected_version,
                current,
            ));
        }

        // Fixed lock order across transactions.
        let mut adjustments = change.adjustments.clone();
        adjustments.sort_by_key(|a| a.product_id);

        let allow_negative = change.policy == StockPolicy::AllowNegative;
        for adjustment in &adjustments {
            let remaining: Option<i64> = sqlx::query_scalar(
                r#"
                UPDATE products
                SET amount = amount - $1, updated_at = NOW()
                WHERE id = $2 AND ($3 OR amount >= $1)
                RETURNING amount
                "#,
            )
            .bind(adjustment.quantity)
            .bind(adjustment.product_id.as_i64())
            .bind(allow_negative)
            .fetch_optional(&mut *tx)
            .await?;

            if remaining.is_none() {
                let available: Option<i64> =
                    sqlx::query_scalar("SELECT amount FROM products WHERE id = $1")
                        .bind(adjustment.product_id.as_i64())
                        .fetch_optional(&mut *tx)
                        .await?;

                if let Some(available) = available {
                    tracing::warn!(
                        product_id = %adjustment.product_id,
                        available,
                        requested = adjustment.quantity,
                        "stock decrement rejected"
                    );
                }
                return Err(match available {
                    Some(available) => StoreError::InsufficientStock {
                        product_id: adjustment.product_id,
                        available,
                        requested: adjustment.quantity,
                    },
                    None => StoreError::not_found("product", adjustment.product_id),
                });
            }
        }

        let sql = format!(
            r#"
            UPDATE orders
            SET status = $1, version = version + 1, updated_at = NOW()
            WHERE id = $2
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query(&sql)
            .bind(&change.status)
            .bind(change.order_id.as_uuid())
            .fetch_one(&mut *tx)
            .await?;
        let order = Self::row_to_order(row)?;

        tx.commit().await?;
        Ok(order)
    }

    async fn stream_orders(&self, query: OrderQuery) -> Result<OrderStream> {
        let pages = OrderPages {
            pool: self.pool.clone(),
            remaining: query.limit,
            query,
            after: None,
            finished: false,
        };

        let pages = stream::unfold(pages, |mut pages| async move {
            if pages.finished {
                return None;
            }
            let page_size = pages
                .remaining
                .map_or(ORDER_PAGE_SIZE, |r| r.min(ORDER_PAGE_SIZE));
            if page_size == 0 {
                return None;
            }

            match Self::fetch_order_page(&pages.pool, &pages.query, pages.after, page_size).await {
                Ok(page) => {
                    if page.len() < page_size {
                        pages.finished = true;
                    }
                    if let Some(last) = page.last() {
                        pages.after = Some((last.created_at, last.id.as_uuid()));
                    }
                    if let Some(remaining) = pages.remaining.as_mut() {
                        *remaining = remaining.saturating_sub(page.len());
                    }
                    Some((Ok(page), pages))
                }
                Err(e) => {
                    pages.finished = true;
                    Some((Err(e), pages))
                }
            }
        });

        let orders = pages.flat_map(|page| {
            let items: Vec<Result<OrderRecord>> = match page {
                Ok(orders) => orders.into_iter().map(Ok).collect(),
                Err(e) => vec![Err(e)],
            };
            stream::iter(items)
        });

        Ok(Box::pin(orders))
    }
}

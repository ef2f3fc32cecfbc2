//! Postgres implementation of OrderRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{NewOrder, Order, OrderStatus, StatusUpdate};
use crate::ports::{OrderListFilter, OrderRepository, RepositoryError, RepositoryResult};

const ORDER_COLUMNS: &str = r#"
    id, receipt_number, buyer_id, seller_id, product_id, total_amount, status,
    shipping_address, buyer_phone, payment_method, created_at, updated_at,
    confirmed_at, confirmed_by, tracking_number, notes
"#;

#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderRepository for PostgresOrderRepository {
    async fn has_open_order(&self, product_id: Uuid) -> RepositoryResult<bool> {
        let open: Vec<&str> = OrderStatus::OPEN.iter().map(OrderStatus::as_str).collect();

        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM orders WHERE product_id = $1 AND status = ANY($2))",
        )
        .bind(product_id)
        .bind(&open)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }

    async fn insert(&self, order: &NewOrder) -> RepositoryResult<Order> {
        let sql = format!(
            r#"
            INSERT INTO orders (
                id, receipt_number, buyer_id, seller_id, product_id, total_amount, status,
                shipping_address, buyer_phone, payment_method, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING {ORDER_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order.id)
            .bind(&order.receipt_number)
            .bind(order.buyer_id)
            .bind(order.seller_id)
            .bind(order.product_id)
            .bind(&order.total_amount)
            .bind(OrderStatus::Pending.as_str())
            .bind(&order.shipping_address)
            .bind(&order.buyer_phone)
            .bind(order.payment_method.as_str())
            .bind(order.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn get(&self, id: Uuid) -> RepositoryResult<Order> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }

    async fn list(&self, filter: OrderListFilter) -> RepositoryResult<Vec<Order>> {
        let sql = format!(
            r#"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        rows.into_iter().map(OrderRow::into_domain).collect()
    }

    async fn update_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        update: &StatusUpdate,
    ) -> RepositoryResult<Option<Order>> {
        let sql = format!(
            r#"
            UPDATE orders SET
                status = $3,
                confirmed_at = COALESCE($4, confirmed_at),
                confirmed_by = COALESCE($5, confirmed_by),
                notes = COALESCE($6, notes),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(expected.as_str())
            .bind(update.status.as_str())
            .bind(update.confirmed_at)
            .bind(&update.confirmed_by)
            .bind(&update.notes)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        match row {
            Some(row) => row.into_domain().map(Some),
            // Distinguish "gone" from "moved on".
            None => self.get(id).await.map(|_| None),
        }
    }

    async fn set_tracking(&self, id: Uuid, tracking_number: &str) -> RepositoryResult<Order> {
        let sql = format!(
            r#"
            UPDATE orders SET tracking_number = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "#
        );
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(tracking_number)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(id.to_string()))?
            .into_domain()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    receipt_number: String,
    buyer_id: Uuid,
    seller_id: Uuid,
    product_id: Uuid,
    total_amount: BigDecimal,
    status: String,
    shipping_address: Option<String>,
    buyer_phone: Option<String>,
    payment_method: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    confirmed_at: Option<DateTime<Utc>>,
    confirmed_by: Option<String>,
    tracking_number: Option<String>,
    notes: Option<String>,
}

impl OrderRow {
    fn into_domain(self) -> RepositoryResult<Order> {
        let status = self
            .status
            .parse()
            .map_err(|e| RepositoryError::Database(format!("order {}: {}", self.id, e)))?;
        let payment_method = self
            .payment_method
            .parse()
            .map_err(|e| RepositoryError::Database(format!("order {}: {}", self.id, e)))?;

        Ok(Order {
            id: self.id,
            receipt_number: self.receipt_number,
            buyer_id: self.buyer_id,
            seller_id: self.seller_id,
            product_id: self.product_id,
            total_amount: self.total_amount,
            status,
            shipping_address: self.shipping_address,
            buyer_phone: self.buyer_phone,
            payment_method,
            created_at: self.created_at,
            updated_at: self.updated_at,
            confirmed_at: self.confirmed_at,
            confirmed_by: self.confirmed_by,
            tracking_number: self.tracking_number,
            notes: self.notes,
        })
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Order, OrderStatus},
    error::{AppError, Result},
    repository::OrderRepository,
};

#[derive(FromRow)]
struct OrderRow {
    id: String,
    gig_id: String,
    buyer_id: String,
    seller_id: String,
    amount_cents: i64,
    status: String,
    payment_id: String,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

pub struct SqliteOrderRepository {
    pool: SqlitePool,
}

impl SqliteOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_order(row: OrderRow) -> Result<Order> {
        Ok(Order {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            gig_id: row.gig_id,
            buyer_id: row.buyer_id,
            seller_id: row.seller_id,
            amount_cents: row.amount_cents,
            status: OrderStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid order status: {}", row.status)))?,
            payment_id: Uuid::parse_str(&row.payment_id).map_err(|e| AppError::Database(e.to_string()))?,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }
}

#[async_trait]
impl OrderRepository for SqliteOrderRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, gig_id, buyer_id, seller_id, amount_cents, status,
                   payment_id, created_at, updated_at
            FROM orders
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_by_payment(&self, payment_id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, gig_id, buyer_id, seller_id, amount_cents, status,
                   payment_id, created_at, updated_at
            FROM orders
            WHERE payment_id = ?
            "#
        )
        .bind(payment_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_order).transpose()
    }

    async fn update_status(&self, id: Uuid, status: OrderStatus, now: DateTime<Utc>) -> Result<Order> {
        sqlx::query(
            r#"
            UPDATE orders
            SET status = ?, updated_at = ?
            WHERE id = ?
            "#
        )
        .bind(status.as_str())
        .bind(now.naive_utc())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::RecordNotFound("Order not found".to_string())
        })
    }
}

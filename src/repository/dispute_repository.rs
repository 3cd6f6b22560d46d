use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Dispute, DisputeStatus},
    error::{AppError, Result},
    repository::DisputeRepository,
};

#[derive(FromRow)]
struct DisputeRow {
    id: String,
    payment_id: String,
    reason: String,
    status: String,
    buyer_id: String,
    seller_id: String,
    raised_by: String,
    created_at: NaiveDateTime,
}

pub struct SqliteDisputeRepository {
    pool: SqlitePool,
}

impl SqliteDisputeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_dispute(row: DisputeRow) -> Result<Dispute> {
        Ok(Dispute {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            payment_id: Uuid::parse_str(&row.payment_id).map_err(|e| AppError::Database(e.to_string()))?,
            reason: row.reason,
            status: DisputeStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid dispute status: {}", row.status)))?,
            buyer_id: row.buyer_id,
            seller_id: row.seller_id,
            raised_by: row.raised_by,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
        })
    }
}

#[async_trait]
impl DisputeRepository for SqliteDisputeRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Dispute>> {
        let row = sqlx::query_as::<_, DisputeRow>(
            r#"
            SELECT id, payment_id, reason, status, buyer_id, seller_id,
                   raised_by, created_at
            FROM disputes
            WHERE id = ?
            "#
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_dispute).transpose()
    }

    async fn list_by_payment(&self, payment_id: Uuid) -> Result<Vec<Dispute>> {
        let rows = sqlx::query_as::<_, DisputeRow>(
            r#"
            SELECT id, payment_id, reason, status, buyer_id, seller_id,
                   raised_by, created_at
            FROM disputes
            WHERE payment_id = ?
            ORDER BY created_at ASC
            "#
        )
        .bind(payment_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(Self::row_to_dispute)
            .collect()
    }
}

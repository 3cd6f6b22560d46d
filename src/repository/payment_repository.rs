use async_trait::async_trait;
use chrono::{DateTime, Utc, NaiveDateTime};
use sqlx::{SqlitePool, FromRow};
use uuid::Uuid;

use crate::{
    domain::{Dispute, Order, Payment, PaymentStatus},
    error::{AppError, Result},
    repository::{CaptureOutcome, PaymentRepository},
};

#[derive(FromRow)]
struct PaymentRow {
    id: String,
    gig_id: String,
    buyer_id: String,
    seller_id: String,
    amount_cents: i64,
    currency: String,
    title: String,
    status: String,
    gateway_order_id: Option<String>,
    capture_id: Option<String>,
    escrow_release_at: Option<NaiveDateTime>,
    released_at: Option<NaiveDateTime>,
    is_disputed: bool,
    dispute_reason: Option<String>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

const SELECT_PAYMENT: &str = r#"
    SELECT id, gig_id, buyer_id, seller_id, amount_cents, currency, title,
           status, gateway_order_id, capture_id, escrow_release_at,
           released_at, is_disputed, dispute_reason, created_at, updated_at
    FROM payments
"#;

pub struct SqlitePaymentRepository {
    pool: SqlitePool,
}

impl SqlitePaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_payment(row: PaymentRow) -> Result<Payment> {
        Ok(Payment {
            id: Uuid::parse_str(&row.id).map_err(|e| AppError::Database(e.to_string()))?,
            gig_id: row.gig_id,
            buyer_id: row.buyer_id,
            seller_id: row.seller_id,
            amount_cents: row.amount_cents,
            currency: row.currency,
            title: row.title,
            status: PaymentStatus::from_str(&row.status)
                .ok_or_else(|| AppError::Database(format!("Invalid payment status: {}", row.status)))?,
            gateway_order_id: row.gateway_order_id,
            capture_id: row.capture_id,
            escrow_release_at: row.escrow_release_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            released_at: row.released_at.map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc)),
            is_disputed: row.is_disputed,
            dispute_reason: row.dispute_reason,
            created_at: DateTime::from_naive_utc_and_offset(row.created_at, Utc),
            updated_at: DateTime::from_naive_utc_and_offset(row.updated_at, Utc),
        })
    }

    async fn fetch_required(&self, id: Uuid) -> Result<Payment> {
        self.find_by_id(id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve updated payment".to_string())
        })
    }
}

#[async_trait]
impl PaymentRepository for SqlitePaymentRepository {
    async fn create(&self, payment: Payment) -> Result<Payment> {
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, gig_id, buyer_id, seller_id, amount_cents, currency, title,
                status, gateway_order_id, capture_id, escrow_release_at,
                released_at, is_disputed, dispute_reason, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(payment.id.to_string())
        .bind(&payment.gig_id)
        .bind(&payment.buyer_id)
        .bind(&payment.seller_id)
        .bind(payment.amount_cents)
        .bind(&payment.currency)
        .bind(&payment.title)
        .bind(payment.status.as_str())
        .bind(&payment.gateway_order_id)
        .bind(&payment.capture_id)
        .bind(payment.escrow_release_at.map(|dt| dt.naive_utc()))
        .bind(payment.released_at.map(|dt| dt.naive_utc()))
        .bind(payment.is_disputed)
        .bind(&payment.dispute_reason)
        .bind(payment.created_at.naive_utc())
        .bind(payment.updated_at.naive_utc())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        self.find_by_id(payment.id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created payment".to_string())
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENT} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENT} WHERE gateway_order_id = ?"))
            .bind(gateway_order_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn list_matured(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "{SELECT_PAYMENT} WHERE status = ? AND escrow_release_at <= ? ORDER BY escrow_release_at ASC LIMIT ?"
        ))
        .bind(PaymentStatus::Completed.as_str())
        .bind(now.naive_utc())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        rows.into_iter()
            .map(Self::row_to_payment)
            .collect()
    }

    async fn attach_gateway_order(
        &self,
        id: Uuid,
        gateway_order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Payment>> {
        let result = sqlx::query(
            r#"
            UPDATE payments
            SET gateway_order_id = ?,
                status = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(gateway_order_id)
        .bind(PaymentStatus::Pending.as_str())
        .bind(now.naive_utc())
        .bind(id.to_string())
        .bind(PaymentStatus::Pending.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.fetch_required(id).await.map(Some)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if !from.can_transition_to(to) {
            return Err(AppError::InvalidState(format!(
                "Payment cannot move from {} to {}",
                from.as_str(),
                to.as_str()
            )));
        }

        // released_at is only stamped on the escrow release
        let released_at = (to == PaymentStatus::Released).then(|| now.naive_utc());

        let result = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                released_at = COALESCE(?, released_at),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(to.as_str())
        .bind(released_at)
        .bind(now.naive_utc())
        .bind(id.to_string())
        .bind(from.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete_capture(
        &self,
        id: Uuid,
        capture_id: Option<&str>,
        escrow_release_at: DateTime<Utc>,
        order: Order,
        now: DateTime<Utc>,
    ) -> Result<CaptureOutcome> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE payments
            SET status = ?,
                capture_id = ?,
                escrow_release_at = ?,
                updated_at = ?
            WHERE id = ? AND status = ?
            "#
        )
        .bind(PaymentStatus::Completed.as_str())
        .bind(capture_id)
        .bind(escrow_release_at.naive_utc())
        .bind(now.naive_utc())
        .bind(id.to_string())
        .bind(PaymentStatus::Pending.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CaptureOutcome::AlreadyCaptured);
        }

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, gig_id, buyer_id, seller_id, amount_cents, status,
                payment_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(order.id.to_string())
        .bind(&order.gig_id)
        .bind(&order.buyer_id)
        .bind(&order.seller_id)
        .bind(order.amount_cents)
        .bind(order.status.as_str())
        .bind(order.payment_id.to_string())
        .bind(order.created_at.naive_utc())
        .bind(order.updated_at.naive_utc())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CaptureOutcome::Captured(order))
    }

    async fn flag_dispute(&self, dispute: Dispute) -> Result<Dispute> {
        let mut tx = self.pool.begin().await?;

        let flagged = sqlx::query(
            r#"
            UPDATE payments
            SET is_disputed = TRUE,
                dispute_reason = ?
            WHERE id = ?
            "#
        )
        .bind(&dispute.reason)
        .bind(dispute.payment_id.to_string())
        .execute(&mut *tx)
        .await?;

        if flagged.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(AppError::RecordNotFound("Payment not found".to_string()));
        }

        sqlx::query(
            r#"
            INSERT INTO disputes (
                id, payment_id, reason, status, buyer_id, seller_id,
                raised_by, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#
        )
        .bind(dispute.id.to_string())
        .bind(dispute.payment_id.to_string())
        .bind(&dispute.reason)
        .bind(dispute.status.as_str())
        .bind(&dispute.buyer_id)
        .bind(&dispute.seller_id)
        .bind(&dispute.raised_by)
        .bind(dispute.created_at.naive_utc())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(dispute)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::*;
use crate::error::Result;

pub mod payment_repository;
pub mod order_repository;
pub mod dispute_repository;

pub use payment_repository::SqlitePaymentRepository;
pub use order_repository::SqliteOrderRepository;
pub use dispute_repository::SqliteDisputeRepository;

/// Result of the conditional capture write.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// The payment moved from `PENDING` to `COMPLETED` and this order was created.
    Captured(Order),
    /// Another writer already completed the payment; nothing was written.
    AlreadyCaptured,
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create(&self, payment: Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_gateway_order_id(&self, gateway_order_id: &str) -> Result<Option<Payment>>;
    /// `COMPLETED` payments whose escrow release date is at or before `now`, oldest first.
    async fn list_matured(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Payment>>;
    /// Store the gateway order id on a payment that is still `PENDING`.
    /// Returns `None` when the payment is missing or no longer pending.
    async fn attach_gateway_order(
        &self,
        id: Uuid,
        gateway_order_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Payment>>;
    /// Conditional status change; `false` when the current status was not `from`.
    async fn transition(
        &self,
        id: Uuid,
        from: PaymentStatus,
        to: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    /// Atomically mark the payment `COMPLETED` and insert `order`, but only
    /// while the payment is still `PENDING`.
    async fn complete_capture(
        &self,
        id: Uuid,
        capture_id: Option<&str>,
        escrow_release_at: DateTime<Utc>,
        order: Order,
        now: DateTime<Utc>,
    ) -> Result<CaptureOutcome>;
    /// Atomically flag the payment as disputed and insert `dispute`.
    /// Only `is_disputed` and `dispute_reason` change on the payment.
    async fn flag_dispute(&self, dispute: Dispute) -> Result<Dispute>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>>;
    async fn find_by_payment(&self, payment_id: Uuid) -> Result<Option<Order>>;
    async fn update_status(&self, id: Uuid, status: OrderStatus, now: DateTime<Utc>) -> Result<Order>;
}

#[async_trait]
pub trait DisputeRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Dispute>>;
    async fn list_by_payment(&self, payment_id: Uuid) -> Result<Vec<Dispute>>;
}

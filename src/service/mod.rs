pub mod checkout_service;
pub mod clock;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::auth::IdentityVerifier;
use crate::payments::PaymentGateway;
use checkout_service::CheckoutService;
use clock::Clock;

pub use checkout_service::{CapturedPayment, CreatePaymentInput, CreatedPayment, PaymentView, ReleaseOutcome};
pub use clock::SystemClock;
#[cfg(any(test, feature = "test-utils"))]
pub use clock::ManualClock;

pub struct ServiceContext {
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub order_repo: Arc<dyn OrderRepository>,
    pub dispute_repo: Arc<dyn DisputeRepository>,
    pub identity_verifier: Arc<dyn IdentityVerifier>,
    pub checkout_service: Arc<CheckoutService>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        gateway: Arc<dyn PaymentGateway>,
        identity_verifier: Arc<dyn IdentityVerifier>,
        clock: Arc<dyn Clock>,
        hold_days: i64,
    ) -> Self {
        let payment_repo: Arc<dyn PaymentRepository> = Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let order_repo: Arc<dyn OrderRepository> = Arc::new(SqliteOrderRepository::new(db_pool.clone()));
        let dispute_repo: Arc<dyn DisputeRepository> = Arc::new(SqliteDisputeRepository::new(db_pool.clone()));

        let checkout_service = Arc::new(CheckoutService::new(
            payment_repo.clone(),
            order_repo.clone(),
            dispute_repo.clone(),
            gateway,
            clock,
            hold_days,
        ));

        Self {
            payment_repo,
            order_repo,
            dispute_repo,
            identity_verifier,
            checkout_service,
            db_pool,
        }
    }
}

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use flexhunt_checkout::{
    auth::{Identity, IdentityVerifier, JwtVerifier},
    config::Settings,
    payments::{FakePaymentGateway, PaymentGateway},
    service::{CreatePaymentInput, ManualClock, ServiceContext},
};

pub const JWT_SECRET: &str = "integration-test-secret";
pub const BUYER: &str = "buyer-b";
pub const SELLER: &str = "seller-s";
pub const GIG: &str = "gig-g";

pub struct TestContext {
    pub context: Arc<ServiceContext>,
    pub gateway: Arc<FakePaymentGateway>,
    pub clock: Arc<ManualClock>,
    pub pool: SqlitePool,
    pub settings: Settings,
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

/// A single in-memory connection, so every query sees the same database.
pub async fn memory_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await?;

    Ok(pool)
}

pub async fn setup() -> anyhow::Result<TestContext> {
    let pool = memory_pool().await?;

    let mut settings = Settings::default();
    settings.auth.jwt_secret = JWT_SECRET.to_string();

    let gateway = Arc::new(FakePaymentGateway::new());
    let clock = Arc::new(ManualClock::new(start_time()));
    let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(&settings.auth));
    let dyn_gateway: Arc<dyn PaymentGateway> = gateway.clone();

    let context = Arc::new(ServiceContext::new(
        pool.clone(),
        dyn_gateway,
        verifier,
        clock.clone(),
        settings.escrow.hold_days,
    ));

    Ok(TestContext {
        context,
        gateway,
        clock,
        pool,
        settings,
    })
}

pub fn user(id: &str) -> Identity {
    Identity {
        user_id: id.to_string(),
        is_admin: false,
    }
}

pub fn admin() -> Identity {
    Identity {
        user_id: "ops-admin".to_string(),
        is_admin: true,
    }
}

pub fn new_payment_input(amount_cents: i64) -> CreatePaymentInput {
    CreatePaymentInput {
        gig_id: GIG.to_string(),
        buyer_id: BUYER.to_string(),
        seller_id: Some(SELLER.to_string()),
        amount_cents,
        payment_id: None,
        title: Some("Logo design".to_string()),
    }
}

pub async fn count_orders(pool: &SqlitePool) -> anyhow::Result<i64> {
    Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders")
        .fetch_one(pool)
        .await?)
}

pub async fn count_disputes(pool: &SqlitePool) -> anyhow::Result<i64> {
    Ok(sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM disputes")
        .fetch_one(pool)
        .await?)
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

pub mod paypal_client;
pub mod retry;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use paypal_client::PayPalClient;
#[cfg(any(test, feature = "test-utils"))]
pub use fake::FakePaymentGateway;

/// PayPal rejects purchase-unit descriptions longer than this.
pub const MAX_DESCRIPTION_CHARS: usize = 127;

/// Cut `text` to at most [`MAX_DESCRIPTION_CHARS`] characters.
pub fn order_description(text: &str) -> String {
    text.chars().take(MAX_DESCRIPTION_CHARS).collect()
}

/// What the checkout needs from the gateway to open an order.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOrderRequest {
    /// Our payment record id, used as the gateway's reference and idempotency key.
    pub reference_id: String,
    pub amount_cents: i64,
    pub currency: String,
    /// At most [`MAX_DESCRIPTION_CHARS`] characters.
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayCapture {
    pub order_id: String,
    /// Order status reported after the capture call (`COMPLETED` on success).
    pub status: String,
    pub capture_id: Option<String>,
}

impl GatewayCapture {
    pub fn is_completed(&self) -> bool {
        self.status == "COMPLETED"
    }
}

/// Hosted-checkout payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder>;
    async fn capture_order(&self, gateway_order_id: &str) -> Result<GatewayCapture>;
}

/// Stand-in used when no gateway credentials are configured. Every call fails.
pub struct UnconfiguredGateway;

#[async_trait]
impl PaymentGateway for UnconfiguredGateway {
    async fn create_order(&self, _request: CreateOrderRequest) -> Result<GatewayOrder> {
        Err(AppError::Gateway("Payment gateway is not configured".to_string()))
    }

    async fn capture_order(&self, _gateway_order_id: &str) -> Result<GatewayCapture> {
        Err(AppError::Gateway("Payment gateway is not configured".to_string()))
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Payment;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub gig_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub amount_cents: i64,
    pub status: OrderStatus,
    pub payment_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// The fulfillment order handed off once `payment` has been captured.
    pub fn for_captured_payment(payment: &Payment, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            gig_id: payment.gig_id.clone(),
            buyer_id: payment.buyer_id.clone(),
            seller_id: payment.seller_id.clone(),
            amount_cents: payment.amount_cents,
            status: OrderStatus::InProgress,
            payment_id: payment.id,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::InProgress => "IN_PROGRESS",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "IN_PROGRESS" => Some(OrderStatus::InProgress),
            "COMPLETED" => Some(OrderStatus::Completed),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

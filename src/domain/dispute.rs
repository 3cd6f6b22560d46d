use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Payment;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dispute {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub reason: String,
    pub status: DisputeStatus,
    pub buyer_id: String,
    pub seller_id: String,
    pub raised_by: String,
    pub created_at: DateTime<Utc>,
}

impl Dispute {
    pub fn open(payment: &Payment, reason: String, raised_by: String, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_id: payment.id,
            reason,
            status: DisputeStatus::Open,
            buyer_id: payment.buyer_id.clone(),
            seller_id: payment.seller_id.clone(),
            raised_by,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    Open,
    Resolved,
    Rejected,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "OPEN",
            DisputeStatus::Resolved => "RESOLVED",
            DisputeStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(DisputeStatus::Open),
            "RESOLVED" => Some(DisputeStatus::Resolved),
            "REJECTED" => Some(DisputeStatus::Rejected),
            _ => None,
        }
    }
}

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single purchase attempt for a gig, mirrored from the gateway checkout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub gig_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub title: String,
    pub status: PaymentStatus,
    pub gateway_order_id: Option<String>,
    pub capture_id: Option<String>,
    pub escrow_release_at: Option<DateTime<Utc>>,
    pub released_at: Option<DateTime<Utc>>,
    pub is_disputed: bool,
    pub dispute_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new_pending(
        gig_id: String,
        buyer_id: String,
        seller_id: String,
        amount_cents: i64,
        title: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            gig_id,
            buyer_id,
            seller_id,
            amount_cents,
            currency: "USD".to_string(),
            title,
            status: PaymentStatus::Pending,
            gateway_order_id: None,
            capture_id: None,
            escrow_release_at: None,
            released_at: None,
            is_disputed: false,
            dispute_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// True when `user_id` is the buyer or the seller of this payment.
    pub fn is_party(&self, user_id: &str) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }

    pub fn escrow_matured(&self, now: DateTime<Utc>) -> bool {
        self.escrow_release_at.map(|at| at <= now).unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
    Timeout,
    Released,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Timeout => "TIMEOUT",
            PaymentStatus::Released => "RELEASED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            "CANCELLED" => Some(PaymentStatus::Cancelled),
            "TIMEOUT" => Some(PaymentStatus::Timeout),
            "RELEASED" => Some(PaymentStatus::Released),
            _ => None,
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `PENDING` may end in any of the four terminal checkout outcomes, and
    /// only a captured payment can later be released. Everything else is a
    /// backwards or sideways move.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Completed)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Pending, Timeout)
                | (Completed, Released)
        )
    }

    /// Captured at the gateway (funds held or already paid out).
    pub fn is_captured(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Released)
    }
}

/// Release date for funds captured at `captured_at`.
pub fn escrow_release_date(captured_at: DateTime<Utc>, hold_days: i64) -> DateTime<Utc> {
    captured_at + Duration::days(hold_days)
}

/// Parse a decimal USD amount ("50", "50.5", "50.00") into cents.
///
/// Rejects negative, zero, exponent and more-than-two-decimal inputs so the
/// amount sent to the gateway is exactly the amount recorded.
pub fn parse_usd_cents(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };

    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if raw.ends_with('.') {
        return None;
    }

    let dollars: i64 = whole.parse().ok()?;
    let cents: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().ok()? * 10,
        _ => frac.parse().ok()?,
    };

    let total = dollars.checked_mul(100)?.checked_add(cents)?;
    (total > 0).then_some(total)
}

/// Render cents the way the gateway expects amounts ("50.00").
pub fn format_usd(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_usd_cents() {
        assert_eq!(parse_usd_cents("50"), Some(5000));
        assert_eq!(parse_usd_cents("50.00"), Some(5000));
        assert_eq!(parse_usd_cents("50.5"), Some(5050));
        assert_eq!(parse_usd_cents(" 0.99 "), Some(99));
        assert_eq!(parse_usd_cents("0"), None);
        assert_eq!(parse_usd_cents("-5"), None);
        assert_eq!(parse_usd_cents("1.999"), None);
        assert_eq!(parse_usd_cents("1e3"), None);
        assert_eq!(parse_usd_cents("12."), None);
        assert_eq!(parse_usd_cents(".5"), None);
        assert_eq!(parse_usd_cents("abc"), None);
    }

    #[test]
    fn test_format_usd() {
        assert_eq!(format_usd(5000), "50.00");
        assert_eq!(format_usd(99), "0.99");
        assert_eq!(format_usd(123405), "1234.05");
    }

    #[test]
    fn test_status_transitions_only_move_forward() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Timeout));
        assert!(Completed.can_transition_to(Released));
        assert!(!Completed.can_transition_to(Pending));
        assert!(!Released.can_transition_to(Completed));
        assert!(!Cancelled.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Released));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
            PaymentStatus::Timeout,
            PaymentStatus::Released,
        ] {
            assert_eq!(PaymentStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::from_str("pending"), None);
    }

    #[test]
    fn test_escrow_matured() {
        let now = Utc::now();
        let mut payment = Payment::new_pending(
            "gig".into(), "buyer".into(), "seller".into(), 5000, "Logo".into(), now,
        );
        assert!(!payment.escrow_matured(now));

        payment.escrow_release_at = Some(escrow_release_date(now, 7));
        assert!(!payment.escrow_matured(now + Duration::days(1)));
        assert!(payment.escrow_matured(now + Duration::days(7)));
        assert!(payment.escrow_matured(now + Duration::days(8)));
    }
}

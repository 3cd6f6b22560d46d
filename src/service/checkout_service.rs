use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    auth::Identity,
    domain::*,
    error::{AppError, Result},
    payments::{order_description, CreateOrderRequest, PaymentGateway},
    repository::{CaptureOutcome, DisputeRepository, OrderRepository, PaymentRepository},
    service::clock::Clock,
};

/// Input for opening a gateway checkout for a gig.
#[derive(Debug, Clone)]
pub struct CreatePaymentInput {
    pub gig_id: String,
    pub buyer_id: String,
    /// Required only when the payment record does not exist yet.
    pub seller_id: Option<String>,
    pub amount_cents: i64,
    pub payment_id: Option<Uuid>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPayment {
    pub payment_id: Uuid,
    pub gateway_order_id: String,
    pub gateway_status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CapturedPayment {
    pub payment_id: Uuid,
    pub capture_id: Option<String>,
    /// `false` when the payment had already been captured by an earlier call.
    pub newly_captured: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    AlreadyReleased,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    pub payment: Payment,
    pub order: Option<Order>,
    pub disputes: Vec<Dispute>,
}

/// Orchestrates checkout between the caller, the payment gateway and the
/// payment/order/dispute store.
///
/// The payment record's status is the single source of truth for how far the
/// workflow has progressed: orders are only created once the gateway confirms
/// capture, and escrow is only released once the hold period has passed.
pub struct CheckoutService {
    payment_repo: Arc<dyn PaymentRepository>,
    order_repo: Arc<dyn OrderRepository>,
    dispute_repo: Arc<dyn DisputeRepository>,
    gateway: Arc<dyn PaymentGateway>,
    clock: Arc<dyn Clock>,
    hold_days: i64,
}

impl CheckoutService {
    pub fn new(
        payment_repo: Arc<dyn PaymentRepository>,
        order_repo: Arc<dyn OrderRepository>,
        dispute_repo: Arc<dyn DisputeRepository>,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
        hold_days: i64,
    ) -> Self {
        Self {
            payment_repo,
            order_repo,
            dispute_repo,
            gateway,
            clock,
            hold_days,
        }
    }

    pub async fn create_payment(
        &self,
        caller: &Identity,
        input: CreatePaymentInput,
    ) -> Result<CreatedPayment> {
        if !caller.is_admin && caller.user_id != input.buyer_id {
            return Err(AppError::Forbidden("Payments can only be opened by the buyer".to_string()));
        }
        if input.amount_cents <= 0 {
            return Err(AppError::InvalidRequest("Amount must be positive".to_string()));
        }

        let payment = self.load_or_create_pending(&input).await?;

        let description = order_description(&payment.title);
        let order = self
            .gateway
            .create_order(CreateOrderRequest {
                reference_id: payment.id.to_string(),
                amount_cents: payment.amount_cents,
                currency: payment.currency.clone(),
                description,
            })
            .await
            .map_err(|e| {
                tracing::error!("Gateway order creation failed for payment {}: {}", payment.id, e);
                e
            })?;

        self.payment_repo
            .attach_gateway_order(payment.id, &order.id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::InvalidState("Payment is no longer pending".to_string()))?;

        tracing::info!(
            "Opened gateway order {} for payment {} ({} cents)",
            order.id, payment.id, payment.amount_cents
        );

        Ok(CreatedPayment {
            payment_id: payment.id,
            gateway_order_id: order.id,
            gateway_status: order.status,
        })
    }

    async fn load_or_create_pending(&self, input: &CreatePaymentInput) -> Result<Payment> {
        let existing = match input.payment_id {
            Some(id) => self.payment_repo.find_by_id(id).await?,
            None => None,
        };

        if let Some(payment) = existing {
            if payment.gig_id != input.gig_id || payment.buyer_id != input.buyer_id {
                return Err(AppError::InvalidRequest(
                    "Payment record belongs to a different gig or buyer".to_string(),
                ));
            }
            if payment.amount_cents != input.amount_cents {
                return Err(AppError::InvalidRequest(
                    "Amount does not match the payment record".to_string(),
                ));
            }
            if payment.status != PaymentStatus::Pending {
                return Err(AppError::InvalidState(format!(
                    "Payment is {}",
                    payment.status.as_str()
                )));
            }
            return Ok(payment);
        }

        let seller_id = input
            .seller_id
            .clone()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::InvalidRequest("sellerId is required for a new payment".to_string()))?;
        if seller_id == input.buyer_id {
            return Err(AppError::InvalidRequest("Buyers cannot purchase their own gig".to_string()));
        }

        let title = input
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| format!("Gig {}", input.gig_id));

        let mut payment = Payment::new_pending(
            input.gig_id.clone(),
            input.buyer_id.clone(),
            seller_id,
            input.amount_cents,
            title,
            self.clock.now(),
        );
        if let Some(id) = input.payment_id {
            payment.id = id;
        }

        self.payment_repo.create(payment).await
    }

    pub async fn capture_payment(
        &self,
        caller: &Identity,
        gateway_order_id: &str,
        payment_id: Option<Uuid>,
    ) -> Result<CapturedPayment> {
        let payment = self
            .payment_repo
            .find_by_gateway_order_id(gateway_order_id)
            .await?
            .ok_or_else(|| AppError::RecordNotFound("No payment for this gateway order".to_string()))?;

        if payment_id.is_some_and(|id| id != payment.id) {
            return Err(AppError::InvalidRequest(
                "paymentId does not match the gateway order".to_string(),
            ));
        }
        if !caller.is_admin && caller.user_id != payment.buyer_id {
            return Err(AppError::Forbidden("Only the buyer can capture this payment".to_string()));
        }

        match payment.status {
            PaymentStatus::Pending => {}
            PaymentStatus::Completed | PaymentStatus::Released => {
                tracing::debug!("Payment {} already captured", payment.id);
                return Ok(CapturedPayment {
                    payment_id: payment.id,
                    capture_id: payment.capture_id,
                    newly_captured: false,
                });
            }
            other => {
                return Err(AppError::InvalidState(format!("Payment is {}", other.as_str())));
            }
        }

        let capture = self.gateway.capture_order(gateway_order_id).await?;
        if !capture.is_completed() {
            tracing::warn!(
                "Capture of order {} reported {}; leaving payment {} untouched",
                gateway_order_id, capture.status, payment.id
            );
            return Err(AppError::CaptureFailed { status: capture.status });
        }

        let capture_id = capture.capture_id;
        if capture_id.is_none() {
            tracing::warn!("Gateway reported no capture id for order {}", gateway_order_id);
        }

        let now = self.clock.now();
        let order = Order::for_captured_payment(&payment, now);
        let release_at = escrow_release_date(now, self.hold_days);

        match self
            .payment_repo
            .complete_capture(payment.id, capture_id.as_deref(), release_at, order, now)
            .await?
        {
            CaptureOutcome::Captured(order) => {
                tracing::info!(
                    "Payment {} captured; order {} in progress, escrow held until {}",
                    payment.id, order.id, release_at
                );
                Ok(CapturedPayment {
                    payment_id: payment.id,
                    capture_id,
                    newly_captured: true,
                })
            }
            CaptureOutcome::AlreadyCaptured => {
                let current = self.require_payment(payment.id).await?;
                if !current.status.is_captured() {
                    return Err(AppError::InvalidState(format!(
                        "Payment is {}",
                        current.status.as_str()
                    )));
                }
                tracing::info!("Payment {} was captured concurrently", payment.id);
                Ok(CapturedPayment {
                    payment_id: payment.id,
                    capture_id: current.capture_id,
                    newly_captured: false,
                })
            }
        }
    }

    /// Release escrow on behalf of a buyer, seller or admin.
    pub async fn release_escrow(&self, caller: &Identity, payment_id: Uuid) -> Result<ReleaseOutcome> {
        let payment = self.require_payment(payment_id).await?;
        if !caller.is_admin && !payment.is_party(&caller.user_id) {
            return Err(AppError::Forbidden("Not a party to this payment".to_string()));
        }

        self.release(payment).await
    }

    async fn release(&self, payment: Payment) -> Result<ReleaseOutcome> {
        let now = self.clock.now();

        let outcome = match payment.status {
            PaymentStatus::Released => ReleaseOutcome::AlreadyReleased,
            PaymentStatus::Completed => {
                let release_at = payment.escrow_release_at.ok_or_else(|| {
                    AppError::InvalidState("Captured payment has no escrow release date".to_string())
                })?;
                if !payment.escrow_matured(now) {
                    return Err(AppError::EscrowNotMatured { release_at });
                }
                if payment.is_disputed {
                    tracing::warn!("Releasing escrow for disputed payment {}", payment.id);
                }

                let moved = self
                    .payment_repo
                    .transition(payment.id, PaymentStatus::Completed, PaymentStatus::Released, now)
                    .await?;
                if moved {
                    ReleaseOutcome::Released
                } else {
                    let current = self.require_payment(payment.id).await?;
                    if current.status != PaymentStatus::Released {
                        return Err(AppError::InvalidState(format!(
                            "Payment is {}",
                            current.status.as_str()
                        )));
                    }
                    ReleaseOutcome::AlreadyReleased
                }
            }
            other => {
                return Err(AppError::InvalidState(format!(
                    "Payment is {} and has nothing in escrow",
                    other.as_str()
                )));
            }
        };

        // Second write is best effort; the payment status already records the release.
        if let Err(e) = self.complete_linked_order(payment.id).await {
            tracing::warn!("Failed to complete order for payment {}: {}", payment.id, e);
        }

        if outcome == ReleaseOutcome::Released {
            tracing::info!("Released escrow for payment {}", payment.id);
        }

        Ok(outcome)
    }

    async fn complete_linked_order(&self, payment_id: Uuid) -> Result<()> {
        if let Some(order) = self.order_repo.find_by_payment(payment_id).await? {
            if order.status == OrderStatus::InProgress {
                self.order_repo
                    .update_status(order.id, OrderStatus::Completed, self.clock.now())
                    .await?;
            }
        }
        Ok(())
    }

    pub async fn dispute_payment(
        &self,
        caller: &Identity,
        payment_id: Uuid,
        reason: &str,
    ) -> Result<Dispute> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(AppError::InvalidRequest("A dispute reason is required".to_string()));
        }

        let payment = self.require_payment(payment_id).await?;
        if !caller.is_admin && !payment.is_party(&caller.user_id) {
            return Err(AppError::Forbidden("Not a party to this payment".to_string()));
        }

        let dispute = Dispute::open(&payment, reason.to_string(), caller.user_id.clone(), self.clock.now());
        let dispute = self.payment_repo.flag_dispute(dispute).await?;

        tracing::info!("Dispute {} opened on payment {}", dispute.id, payment_id);

        Ok(dispute)
    }

    /// Abandon a checkout that never completed (`CANCELLED` or `TIMEOUT`).
    pub async fn cancel_payment(
        &self,
        caller: &Identity,
        payment_id: Uuid,
        outcome: PaymentStatus,
    ) -> Result<Payment> {
        if !matches!(outcome, PaymentStatus::Cancelled | PaymentStatus::Timeout) {
            return Err(AppError::InvalidRequest(
                "outcome must be CANCELLED or TIMEOUT".to_string(),
            ));
        }

        let payment = self.require_payment(payment_id).await?;
        if !caller.is_admin && caller.user_id != payment.buyer_id {
            return Err(AppError::Forbidden("Only the buyer can cancel this payment".to_string()));
        }

        let moved = self
            .payment_repo
            .transition(payment_id, PaymentStatus::Pending, outcome, self.clock.now())
            .await?;

        let current = self.require_payment(payment_id).await?;
        if !moved && current.status != outcome {
            return Err(AppError::InvalidState(format!(
                "Payment is {}",
                current.status.as_str()
            )));
        }

        Ok(current)
    }

    pub async fn get_payment(&self, caller: &Identity, payment_id: Uuid) -> Result<PaymentView> {
        let payment = self.require_payment(payment_id).await?;
        if !caller.is_admin && !payment.is_party(&caller.user_id) {
            return Err(AppError::Forbidden("Not a party to this payment".to_string()));
        }

        let order = self.order_repo.find_by_payment(payment_id).await?;
        let disputes = self.dispute_repo.list_by_payment(payment_id).await?;

        Ok(PaymentView { payment, order, disputes })
    }

    pub async fn matured_payments(&self, limit: i64) -> Result<Vec<Payment>> {
        self.payment_repo.list_matured(self.clock.now(), limit).await
    }

    /// Release every matured payment, skipping (and logging) individual failures.
    pub async fn release_matured(&self, limit: i64) -> Result<Vec<Uuid>> {
        let mut released = Vec::new();

        for payment in self.matured_payments(limit).await? {
            let id = payment.id;
            match self.release(payment).await {
                Ok(ReleaseOutcome::Released) => released.push(id),
                Ok(ReleaseOutcome::AlreadyReleased) => {}
                Err(e) => tracing::error!("Failed to release payment {}: {}", id, e),
            }
        }

        Ok(released)
    }

    async fn require_payment(&self, id: Uuid) -> Result<Payment> {
        self.payment_repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::RecordNotFound("Payment not found".to_string()))
    }
}

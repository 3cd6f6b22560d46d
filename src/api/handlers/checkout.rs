use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::{extract::ApiJson, middleware::auth::CurrentUser, state::AppState},
    domain::{parse_usd_cents, PaymentStatus},
    error::{AppError, Result},
    service::{CreatePaymentInput, PaymentView, ReleaseOutcome},
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    #[validate(length(min = 1, max = 128))]
    pub gig_id: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub buyer_id: Option<String>,
    #[validate(length(min = 1, max = 128))]
    pub seller_id: Option<String>,
    pub amount: Option<Value>,
    pub payment_id: Option<String>,
    /// Sent to the gateway as the order description, which caps it at 127 chars.
    #[validate(length(max = 127))]
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatePaymentResponse {
    #[serde(rename = "orderID")]
    pub order_id: String,
    pub status: String,
    #[serde(rename = "paymentId")]
    pub payment_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CapturePaymentRequest {
    #[serde(rename = "orderID")]
    #[validate(length(min = 1, max = 64))]
    pub order_id: Option<String>,
    #[serde(rename = "paymentId")]
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturePaymentResponse {
    pub status: &'static str,
    pub capture_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEscrowRequest {
    pub payment_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEscrowResponse {
    pub status: &'static str,
    pub already_released: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DisputePaymentRequest {
    pub payment_id: Option<String>,
    #[validate(length(max = 2000))]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisputePaymentResponse {
    pub status: &'static str,
    pub dispute_id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelPaymentRequest {
    pub payment_id: Option<String>,
    pub outcome: Option<PaymentStatus>,
}

#[derive(Debug, Serialize)]
pub struct CancelPaymentResponse {
    pub status: PaymentStatus,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| AppError::InvalidRequest(format!("{} is required", field)))
}

fn parse_payment_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::InvalidRequest("paymentId is not a valid id".to_string()))
}

/// Amounts arrive as JSON numbers or numeric strings.
fn parse_amount(value: &Value) -> Result<i64> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        _ => return Err(AppError::InvalidRequest("amount must be numeric".to_string())),
    };

    parse_usd_cents(&raw).ok_or_else(|| {
        AppError::InvalidRequest(
            "amount must be a positive USD value with at most two decimals".to_string(),
        )
    })
}

pub async fn create_payment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreatePaymentRequest>,
) -> Result<Json<CreatePaymentResponse>> {
    req.validate()?;

    let gig_id = required(req.gig_id, "gigId")?;
    let buyer_id = required(req.buyer_id, "buyerId")?;
    let amount_cents = parse_amount(&required(req.amount, "amount")?)?;
    let payment_id = req.payment_id.as_deref().map(parse_payment_id).transpose()?;

    let created = state.service_context.checkout_service
        .create_payment(&user.identity, CreatePaymentInput {
            gig_id,
            buyer_id,
            seller_id: req.seller_id,
            amount_cents,
            payment_id,
            title: req.title,
        })
        .await?;

    Ok(Json(CreatePaymentResponse {
        order_id: created.gateway_order_id,
        status: created.gateway_status,
        payment_id: created.payment_id,
    }))
}

pub async fn capture_payment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CapturePaymentRequest>,
) -> Result<Json<CapturePaymentResponse>> {
    req.validate()?;

    let order_id = required(req.order_id, "orderID")?;
    let payment_id = req.payment_id.as_deref().map(parse_payment_id).transpose()?;

    let captured = state.service_context.checkout_service
        .capture_payment(&user.identity, &order_id, payment_id)
        .await?;

    Ok(Json(CapturePaymentResponse {
        status: "COMPLETED",
        capture_id: captured.capture_id,
    }))
}

pub async fn release_escrow(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(req): ApiJson<ReleaseEscrowRequest>,
) -> Result<Json<ReleaseEscrowResponse>> {
    let payment_id = parse_payment_id(&required(req.payment_id, "paymentId")?)?;

    let outcome = state.service_context.checkout_service
        .release_escrow(&user.identity, payment_id)
        .await?;

    Ok(Json(ReleaseEscrowResponse {
        status: "SUCCESS",
        already_released: outcome == ReleaseOutcome::AlreadyReleased,
    }))
}

pub async fn dispute_payment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(req): ApiJson<DisputePaymentRequest>,
) -> Result<Json<DisputePaymentResponse>> {
    req.validate()?;

    let payment_id = parse_payment_id(&required(req.payment_id, "paymentId")?)?;
    let reason = required(req.reason, "reason")?;

    let dispute = state.service_context.checkout_service
        .dispute_payment(&user.identity, payment_id, &reason)
        .await?;

    Ok(Json(DisputePaymentResponse {
        status: "DISPUTE_CREATED",
        dispute_id: dispute.id,
    }))
}

pub async fn cancel_payment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CancelPaymentRequest>,
) -> Result<Json<CancelPaymentResponse>> {
    let payment_id = parse_payment_id(&required(req.payment_id, "paymentId")?)?;
    let outcome = req.outcome.unwrap_or(PaymentStatus::Cancelled);

    let payment = state.service_context.checkout_service
        .cancel_payment(&user.identity, payment_id, outcome)
        .await?;

    Ok(Json(CancelPaymentResponse { status: payment.status }))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<PaymentView>> {
    let payment_id = parse_payment_id(&id)?;

    let view = state.service_context.checkout_service
        .get_payment(&user.identity, payment_id)
        .await?;

    Ok(Json(view))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_amount_accepts_numbers_and_strings() {
        assert_eq!(parse_amount(&json!(50)).unwrap(), 5000);
        assert_eq!(parse_amount(&json!(50.00)).unwrap(), 5000);
        assert_eq!(parse_amount(&json!(19.99)).unwrap(), 1999);
        assert_eq!(parse_amount(&json!("12.5")).unwrap(), 1250);
    }

    #[test]
    fn test_parse_amount_rejects_non_numeric() {
        assert!(matches!(parse_amount(&json!("ten")), Err(AppError::InvalidRequest(_))));
        assert!(matches!(parse_amount(&json!(true)), Err(AppError::InvalidRequest(_))));
        assert!(matches!(parse_amount(&json!(-3)), Err(AppError::InvalidRequest(_))));
        assert!(matches!(parse_amount(&json!(0)), Err(AppError::InvalidRequest(_))));
    }
}

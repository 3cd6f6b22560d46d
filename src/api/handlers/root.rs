use axum::{http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "FlexHunt Checkout API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Payment capture and escrow for FlexHunt gigs",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "createPayment": "/api/create-payment",
            "capturePayment": "/api/capture-payment",
            "releaseEscrow": "/api/release-escrow",
            "disputePayment": "/api/dispute-payment",
            "cancelPayment": "/api/cancel-payment",
            "payment": "/api/payments/:id"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

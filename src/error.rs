use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    /// Transport failure, 5xx or 429 from the gateway. Worth retrying.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Capture failed with gateway status {status}")]
    CaptureFailed { status: String },

    #[error("Not found: {0}")]
    RecordNotFound(String),

    #[error("Escrow is held until {release_at}")]
    EscrowNotMatured { release_at: DateTime<Utc> },

    #[error("Origin not allowed: {origin}")]
    CorsRejected { origin: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code sent as the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::InvalidRequest(_) => "INVALID_REQUEST",
            AppError::Gateway(_) | AppError::GatewayUnavailable(_) => "GATEWAY_ERROR",
            AppError::CaptureFailed { .. } => "CAPTURE_FAILED",
            AppError::RecordNotFound(_) => "NOT_FOUND",
            AppError::EscrowNotMatured { .. } => "ESCROW_NOT_MATURED",
            AppError::CorsRejected { .. } => "CORS_REJECTED",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) | AppError::CorsRejected { .. } => StatusCode::FORBIDDEN,
            AppError::InvalidRequest(_) | AppError::EscrowNotMatured { .. } => StatusCode::BAD_REQUEST,
            AppError::Gateway(_) | AppError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
            AppError::CaptureFailed { .. } => StatusCode::PAYMENT_REQUIRED,
            AppError::RecordNotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::GatewayUnavailable(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match self {
            AppError::Database(ref msg) => {
                tracing::error!("Database error: {}", msg);
                "Database error occurred".to_string()
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Gateway(ref msg) | AppError::GatewayUnavailable(ref msg) => {
                tracing::error!("Payment gateway error: {}", msg);
                "Payment gateway request failed".to_string()
            }
            AppError::CorsRejected { ref origin } => {
                tracing::warn!("Rejected request from origin {}", origin);
                "Origin not allowed".to_string()
            }
            ref other => other.to_string(),
        };

        let body = Json(json!({
            "error": self.code(),
            "message": message,
            "timestamp": Utc::now().to_rfc3339(),
        }));

        (self.status(), body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidRequest(errors.to_string())
    }
}

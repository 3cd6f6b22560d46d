use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;

use crate::{
    config::GatewayConfig,
    domain::format_usd,
    error::{AppError, Result},
    payments::{
        retry::RetryPolicy, CreateOrderRequest, GatewayCapture, GatewayOrder, PaymentGateway,
    },
};

/// Refresh the OAuth token this long before PayPal says it expires.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Deserialize)]
struct PurchaseUnit {
    payments: Option<UnitPayments>,
}

#[derive(Deserialize)]
struct UnitPayments {
    #[serde(default)]
    captures: Vec<CaptureEntry>,
}

#[derive(Deserialize)]
struct CaptureEntry {
    id: String,
}

#[derive(Deserialize, Default)]
struct ErrorResponse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    issue: String,
}

impl ErrorResponse {
    fn issue(&self) -> Option<&str> {
        self.details.first().map(|d| d.issue.as_str())
    }
}

impl OrderResponse {
    fn into_capture(self) -> GatewayCapture {
        let capture_id = self
            .purchase_units
            .into_iter()
            .filter_map(|unit| unit.payments)
            .flat_map(|payments| payments.captures)
            .map(|capture| capture.id)
            .next();

        GatewayCapture {
            order_id: self.id,
            status: self.status,
            capture_id,
        }
    }
}

/// PayPal Orders v2 client.
pub struct PayPalClient {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    brand_name: String,
    retry: RetryPolicy,
    token: RwLock<Option<AccessToken>>,
}

impl PayPalClient {
    /// `None` when the client credentials are not configured.
    pub fn from_config(config: &GatewayConfig) -> Result<Option<Self>> {
        let (Some(client_id), Some(client_secret)) =
            (config.client_id.clone(), config.client_secret.clone())
        else {
            return Ok(None);
        };

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Some(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id,
            client_secret,
            brand_name: config.brand_name.clone(),
            retry: RetryPolicy::default(),
            token: RwLock::new(None),
        }))
    }

    async fn access_token(&self) -> Result<String> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > Instant::now() {
                    return Ok(token.value.clone());
                }
            }
        }

        // Token requests are idempotent, so they get the retry policy.
        let fresh = self
            .retry
            .run("PayPal token request", AppError::is_transient, || self.fetch_access_token())
            .await?;

        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        let value = fresh.access_token;
        *self.token.write().await = Some(AccessToken {
            value: value.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(value)
    }

    async fn fetch_access_token(&self) -> Result<TokenResponse> {
        let body = serde_urlencoded::to_string([("grant_type", "client_credentials")])
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error = read_error(response).await;
            return Err(status_error(status, "Token request", &error));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| AppError::Gateway(format!("Malformed token response: {}", e)))
    }

    fn order_url(&self, gateway_order_id: &str) -> String {
        format!(
            "{}/v2/checkout/orders/{}",
            self.base_url,
            urlencoding::encode(gateway_order_id)
        )
    }

    async fn get_order(&self, gateway_order_id: &str) -> Result<OrderResponse> {
        let token = self.access_token().await?;
        let url = self.order_url(gateway_order_id);

        self.retry
            .run("PayPal order lookup", AppError::is_transient, || async {
                let response = self
                    .http
                    .get(&url)
                    .bearer_auth(&token)
                    .send()
                    .await
                    .map_err(|e| AppError::GatewayUnavailable(format!("Order lookup failed: {}", e)))?;
                parse_order(response).await
            })
            .await
    }
}

async fn read_error(response: Response) -> ErrorResponse {
    response.json::<ErrorResponse>().await.unwrap_or_default()
}

/// Server-side failures and rate limiting may clear up on a retry; other
/// statuses will not.
fn status_error(status: StatusCode, what: &str, error: &ErrorResponse) -> AppError {
    let message = format!("{} returned {}: {} {}", what, status, error.name, error.message);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AppError::GatewayUnavailable(message)
    } else {
        AppError::Gateway(message)
    }
}

async fn parse_order(response: Response) -> Result<OrderResponse> {
    if !response.status().is_success() {
        let status = response.status();
        let error = read_error(response).await;
        return Err(status_error(status, "Order request", &error));
    }

    response
        .json::<OrderResponse>()
        .await
        .map_err(|e| AppError::Gateway(format!("Malformed order response: {}", e)))
}

#[async_trait]
impl PaymentGateway for PayPalClient {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder> {
        let token = self.access_token().await?;

        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": request.reference_id,
                "description": request.description,
                "amount": {
                    "currency_code": request.currency,
                    "value": format_usd(request.amount_cents),
                },
            }],
            "application_context": {
                "brand_name": self.brand_name,
                "shipping_preference": "NO_SHIPPING",
                "user_action": "PAY_NOW",
            },
        });

        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", format!("create-{}", request.reference_id))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("Order creation failed: {}", e)))?;

        let order = parse_order(response).await?;
        tracing::info!("Created PayPal order {} ({})", order.id, order.status);

        Ok(GatewayOrder {
            id: order.id,
            status: order.status,
        })
    }

    async fn capture_order(&self, gateway_order_id: &str) -> Result<GatewayCapture> {
        let token = self.access_token().await?;

        let response = self
            .http
            .post(format!("{}/capture", self.order_url(gateway_order_id)))
            .bearer_auth(&token)
            .header("PayPal-Request-Id", format!("capture-{}", gateway_order_id))
            .json(&json!({}))
            .send()
            .await
            .map_err(|e| AppError::GatewayUnavailable(format!("Capture request failed: {}", e)))?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            let error = read_error(response).await;
            return match error.issue() {
                // A previous capture went through; report what the order looks like now.
                Some("ORDER_ALREADY_CAPTURED") => {
                    Ok(self.get_order(gateway_order_id).await?.into_capture())
                }
                Some(issue) => Ok(GatewayCapture {
                    order_id: gateway_order_id.to_string(),
                    status: issue.to_string(),
                    capture_id: None,
                }),
                None => Err(AppError::Gateway(format!(
                    "Capture rejected: {} {}",
                    error.name, error.message
                ))),
            };
        }

        let capture = parse_order(response).await?.into_capture();
        tracing::info!("Captured PayPal order {} ({})", capture.order_id, capture.status);

        Ok(capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_id_is_read_from_first_purchase_unit() {
        let raw = r#"{
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "default",
                "payments": { "captures": [{ "id": "3C679366HH908993F", "status": "COMPLETED" }] }
            }]
        }"#;
        let order: OrderResponse = serde_json::from_str(raw).unwrap();
        let capture = order.into_capture();

        assert_eq!(capture.order_id, "5O190127TN364715T");
        assert!(capture.is_completed());
        assert_eq!(capture.capture_id.as_deref(), Some("3C679366HH908993F"));
    }

    #[test]
    fn test_created_order_has_no_capture() {
        let raw = r#"{ "id": "O1", "status": "CREATED", "links": [] }"#;
        let capture = serde_json::from_str::<OrderResponse>(raw).unwrap().into_capture();
        assert!(!capture.is_completed());
        assert_eq!(capture.capture_id, None);
    }

    #[test]
    fn test_error_issue() {
        let raw = r#"{
            "name": "UNPROCESSABLE_ENTITY",
            "message": "The requested action could not be performed.",
            "details": [{ "issue": "ORDER_NOT_APPROVED", "description": "Payer has not yet approved the Order for payment." }]
        }"#;
        let error: ErrorResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(error.issue(), Some("ORDER_NOT_APPROVED"));
    }

    #[test]
    fn test_only_server_errors_and_rate_limits_are_transient() {
        let error = ErrorResponse::default();

        assert!(status_error(StatusCode::SERVICE_UNAVAILABLE, "Order request", &error).is_transient());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "Order request", &error).is_transient());
        assert!(!status_error(StatusCode::UNAUTHORIZED, "Token request", &error).is_transient());
        assert!(!status_error(StatusCode::NOT_FOUND, "Order request", &error).is_transient());
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = GatewayConfig::default();
        assert!(PayPalClient::from_config(&config).unwrap().is_none());

        let config = GatewayConfig {
            client_id: Some("id".into()),
            client_secret: Some("secret".into()),
            base_url: "https://api-m.sandbox.paypal.com/".into(),
            ..GatewayConfig::default()
        };
        let client = PayPalClient::from_config(&config).unwrap().unwrap();
        assert_eq!(
            client.order_url("O 1"),
            "https://api-m.sandbox.paypal.com/v2/checkout/orders/O%201"
        );
    }
}

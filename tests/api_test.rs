mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Duration;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use flexhunt_checkout::{api, auth::sign_token};

fn app(t: &TestContext) -> Router {
    api::create_app(t.context.clone(), Arc::new(t.settings.clone()))
}

fn token(user_id: &str) -> String {
    sign_token(JWT_SECRET, user_id, false)
}

fn post(path: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = response.into_body().collect().await?.to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}

#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let t = setup().await?;
    let request = Request::builder().uri("/health").body(Body::empty())?;

    let (status, body) = send(app(&t), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    Ok(())
}

#[tokio::test]
async fn test_www_origin_is_accepted() -> anyhow::Result<()> {
    let t = setup().await?;
    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "https://www.flexhunt.co")
        .body(Body::empty())?;

    let response = app(&t).oneshot(request).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "https://www.flexhunt.co"
    );

    Ok(())
}

#[tokio::test]
async fn test_unknown_origin_is_rejected() -> anyhow::Result<()> {
    let t = setup().await?;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/create-payment")
        .header(header::ORIGIN, "https://evil.example")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))?;

    let (status, body) = send(app(&t), request).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "CORS_REJECTED");
    assert!(body["timestamp"].is_string());
    // The allow-list is not echoed back.
    assert!(!body.to_string().contains("flexhunt.co"));

    Ok(())
}

#[tokio::test]
async fn test_preflight_from_allowed_origin() -> anyhow::Result<()> {
    let t = setup().await?;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/capture-payment")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization,content-type")
        .body(Body::empty())?;

    let response = app(&t).oneshot(request).await?;
    assert!(response.status().is_success());
    assert_eq!(
        response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );

    Ok(())
}

#[tokio::test]
async fn test_missing_or_bad_token_is_unauthorized() -> anyhow::Result<()> {
    let t = setup().await?;
    let body = json!({ "gigId": GIG, "buyerId": BUYER, "amount": 50.00, "sellerId": SELLER });

    let (status, response) = send(app(&t), post("/api/create-payment", None, body.clone())).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response["error"], "UNAUTHORIZED");

    let forged = sign_token("not-the-secret", BUYER, false);
    let (status, _) = send(app(&t), post("/api/create-payment", Some(&forged), body)).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn test_create_payment_validation() -> anyhow::Result<()> {
    let t = setup().await?;
    let buyer = token(BUYER);

    let (status, body) = send(
        app(&t),
        post("/api/create-payment", Some(&buyer), json!({ "gigId": GIG, "amount": 10 })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_REQUEST");

    let (status, _) = send(
        app(&t),
        post(
            "/api/create-payment",
            Some(&buyer),
            json!({ "gigId": GIG, "buyerId": BUYER, "sellerId": SELLER, "amount": "fifty" }),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        app(&t),
        post(
            "/api/create-payment",
            Some(&buyer),
            json!({ "gigId": GIG, "buyerId": BUYER, "sellerId": SELLER, "amount": 10, "paymentId": "nope" }),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_REQUEST");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/create-payment")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {}", buyer))
        .body(Body::from("{not json"))?;
    let (status, body) = send(app(&t), request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_REQUEST");

    Ok(())
}

#[tokio::test]
async fn test_checkout_flow_over_http() -> anyhow::Result<()> {
    let t = setup().await?;
    let buyer = token(BUYER);
    let seller = token(SELLER);

    let (status, created) = send(
        app(&t),
        post(
            "/api/create-payment",
            Some(&buyer),
            json!({ "gigId": GIG, "buyerId": BUYER, "sellerId": SELLER, "amount": 50.00, "title": "Logo design" }),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["orderID"], "O1");
    let payment_id = created["paymentId"].as_str().unwrap().to_string();

    let (status, captured) = send(
        app(&t),
        post("/api/capture-payment", Some(&buyer), json!({ "orderID": "O1", "paymentId": payment_id })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(captured, json!({ "status": "COMPLETED", "captureId": "CAP-O1" }));

    // Capturing again is a success that creates nothing new.
    let (status, _) = send(
        app(&t),
        post("/api/capture-payment", Some(&buyer), json!({ "orderID": "O1" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(count_orders(&t.pool).await?, 1);

    t.clock.advance(Duration::days(1));
    let (status, body) = send(
        app(&t),
        post("/api/release-escrow", Some(&seller), json!({ "paymentId": payment_id })),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ESCROW_NOT_MATURED");

    let (status, body) = send(
        app(&t),
        post("/api/dispute-payment", Some(&buyer), json!({ "paymentId": payment_id, "reason": "Late delivery" })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "DISPUTE_CREATED");
    assert!(body["disputeId"].is_string());

    t.clock.advance(Duration::days(7));
    let (status, body) = send(
        app(&t),
        post("/api/release-escrow", Some(&seller), json!({ "paymentId": payment_id })),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "SUCCESS");
    assert_eq!(body["alreadyReleased"], false);

    let request = Request::builder()
        .uri(format!("/api/payments/{}", payment_id))
        .header(header::AUTHORIZATION, format!("Bearer {}", seller))
        .body(Body::empty())?;
    let (status, view) = send(app(&t), request).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["payment"]["status"], "RELEASED");
    assert_eq!(view["payment"]["isDisputed"], true);
    assert_eq!(view["payment"]["disputeReason"], "Late delivery");
    assert_eq!(view["order"]["status"], "COMPLETED");
    assert_eq!(view["disputes"].as_array().unwrap().len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_error_statuses() -> anyhow::Result<()> {
    let t = setup().await?;
    let buyer = token(BUYER);

    let (status, body) = send(
        app(&t),
        post("/api/capture-payment", Some(&buyer), json!({ "orderID": "missing" })),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");

    send(
        app(&t),
        post(
            "/api/create-payment",
            Some(&buyer),
            json!({ "gigId": GIG, "buyerId": BUYER, "sellerId": SELLER, "amount": "12.50" }),
        ),
    )
    .await?;
    t.gateway.set_capture_status("O1", "PAYER_ACTION_REQUIRED");

    let (status, body) = send(
        app(&t),
        post("/api/capture-payment", Some(&buyer), json!({ "orderID": "O1" })),
    )
    .await?;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "CAPTURE_FAILED");
    assert!(body["message"].as_str().unwrap().contains("PAYER_ACTION_REQUIRED"));

    t.gateway.fail_create_orders(true);
    let (status, body) = send(
        app(&t),
        post(
            "/api/create-payment",
            Some(&buyer),
            json!({ "gigId": GIG, "buyerId": BUYER, "sellerId": SELLER, "amount": 5 }),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "GATEWAY_ERROR");

    let (status, body) = send(
        app(&t),
        post(
            "/api/create-payment",
            Some(&token("someone-else")),
            json!({ "gigId": GIG, "buyerId": BUYER, "sellerId": SELLER, "amount": 5 }),
        ),
    )
    .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");

    Ok(())
}

//! In-memory gateway for tests. Orders are numbered `O1`, `O2`, ... and
//! capture with whatever status the test scripted (default `COMPLETED`).

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    error::{AppError, Result},
    payments::{CreateOrderRequest, GatewayCapture, GatewayOrder, PaymentGateway},
};

#[derive(Default)]
struct FakeState {
    next_order: u32,
    created: Vec<CreateOrderRequest>,
    capture_calls: Vec<String>,
    capture_status: HashMap<String, String>,
    without_capture_id: HashSet<String>,
    fail_create: bool,
}

#[derive(Default)]
pub struct FakePaymentGateway {
    state: Mutex<FakeState>,
}

impl FakePaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next capture of `order_id` report `status` instead of `COMPLETED`.
    pub fn set_capture_status(&self, order_id: &str, status: &str) {
        self.lock().capture_status.insert(order_id.to_string(), status.to_string());
    }

    /// Complete captures of `order_id` without reporting a capture id.
    pub fn omit_capture_id(&self, order_id: &str) {
        self.lock().without_capture_id.insert(order_id.to_string());
    }

    pub fn fail_create_orders(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    pub fn created_orders(&self) -> Vec<CreateOrderRequest> {
        self.lock().created.clone()
    }

    pub fn capture_calls(&self) -> Vec<String> {
        self.lock().capture_calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl PaymentGateway for FakePaymentGateway {
    async fn create_order(&self, request: CreateOrderRequest) -> Result<GatewayOrder> {
        let mut state = self.lock();
        if state.fail_create {
            return Err(AppError::Gateway("order creation refused".to_string()));
        }

        state.next_order += 1;
        let id = format!("O{}", state.next_order);
        state.created.push(request);

        Ok(GatewayOrder {
            id,
            status: "CREATED".to_string(),
        })
    }

    async fn capture_order(&self, gateway_order_id: &str) -> Result<GatewayCapture> {
        let mut state = self.lock();
        state.capture_calls.push(gateway_order_id.to_string());

        let status = state
            .capture_status
            .get(gateway_order_id)
            .cloned()
            .unwrap_or_else(|| "COMPLETED".to_string());
        let capture_id = (status == "COMPLETED" && !state.without_capture_id.contains(gateway_order_id))
            .then(|| format!("CAP-{}", gateway_order_id));

        Ok(GatewayCapture {
            order_id: gateway_order_id.to_string(),
            status,
            capture_id,
        })
    }
}

pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, &settings);
    let allowed_origins = app_state.allowed_origins.clone();

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        // Checkout API (bearer token required)
        .nest("/api", checkout_routes(app_state.clone()))

        // Add state to the router
        .with_state(app_state)

        // Middleware. Disallowed origins are refused before CORS headers are considered.
        .layer(middleware::cors::cors_layer(allowed_origins.clone()))
        .layer(axum::middleware::from_fn_with_state(
            allowed_origins,
            middleware::cors::enforce_origin,
        ))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}

fn checkout_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/create-payment", post(handlers::checkout::create_payment))
        .route("/capture-payment", post(handlers::checkout::capture_payment))
        .route("/release-escrow", post(handlers::checkout::release_escrow))
        .route("/dispute-payment", post(handlers::checkout::dispute_payment))
        .route("/cancel-payment", post(handlers::checkout::cancel_payment))
        .route("/payments/:id", get(handlers::checkout::get_payment))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

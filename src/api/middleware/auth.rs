use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use crate::{
    api::state::AppState,
    auth::{bearer_token, Identity},
    error::AppError,
};

#[derive(Clone)]
pub struct CurrentUser {
    pub identity: Identity,
}

/// Verify the bearer token with the identity provider and expose the caller
/// to handlers as `Extension<CurrentUser>`.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))?;

    let identity = state
        .service_context
        .identity_verifier
        .verify(token)
        .await?;

    tracing::debug!("Authenticated request from {}", identity.user_id);

    // Insert current user into request extensions
    request.extensions_mut().insert(CurrentUser { identity });

    Ok(next.run(request).await)
}

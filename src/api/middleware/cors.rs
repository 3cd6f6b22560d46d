use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::error::AppError;

/// Canonical form of an origin: lowercase, no trailing slash, no leading
/// `www.` on the host. Scheme and port are kept.
///
/// Returns `None` for values that are not `scheme://host[:port]`.
pub fn normalize_origin(origin: &str) -> Option<String> {
    let origin = origin.trim().trim_end_matches('/').to_ascii_lowercase();
    let (scheme, authority) = origin.split_once("://")?;

    if scheme.is_empty() || authority.is_empty() || authority.contains('/') {
        return None;
    }

    let authority = authority.strip_prefix("www.").unwrap_or(authority);
    if authority.is_empty() || authority.starts_with(':') {
        return None;
    }

    Some(format!("{}://{}", scheme, authority))
}

/// Origins allowed to call the API, stored in canonical form.
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: HashSet<String>,
}

impl AllowedOrigins {
    pub fn new(origins: &[String]) -> Self {
        let origins = origins
            .iter()
            .filter_map(|origin| {
                let normalized = normalize_origin(origin);
                if normalized.is_none() {
                    tracing::warn!("Ignoring malformed allowed origin: {}", origin);
                }
                normalized
            })
            .collect();

        Self { origins }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        normalize_origin(origin)
            .map(|o| self.origins.contains(&o))
            .unwrap_or(false)
    }
}

/// Reject requests whose `Origin` is not allow-listed with 403.
/// Requests without an `Origin` header (server-to-server) pass through.
pub async fn enforce_origin(
    State(allowed): State<Arc<AllowedOrigins>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !allowed.is_allowed(origin) {
            return Err(AppError::CorsRejected {
                origin: origin.to_string(),
            });
        }
    }

    Ok(next.run(request).await)
}

/// CORS response headers for allow-listed origins.
pub fn cors_layer(allowed: Arc<AllowedOrigins>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| allowed.is_allowed(o))
                .unwrap_or(false)
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(600))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_origin() {
        assert_eq!(normalize_origin("https://flexhunt.co").as_deref(), Some("https://flexhunt.co"));
        assert_eq!(normalize_origin("https://www.flexhunt.co").as_deref(), Some("https://flexhunt.co"));
        assert_eq!(normalize_origin("https://flexhunt.co/").as_deref(), Some("https://flexhunt.co"));
        assert_eq!(normalize_origin("HTTPS://WWW.FlexHunt.co/").as_deref(), Some("https://flexhunt.co"));
        assert_eq!(normalize_origin("http://localhost:3000").as_deref(), Some("http://localhost:3000"));
        assert_eq!(normalize_origin("flexhunt.co"), None);
        assert_eq!(normalize_origin("https://"), None);
        assert_eq!(normalize_origin("https://flexhunt.co/path"), None);
    }

    #[test]
    fn test_scheme_is_significant() {
        let allowed = AllowedOrigins::new(&["https://flexhunt.co".to_string()]);
        assert!(allowed.is_allowed("https://flexhunt.co"));
        assert!(allowed.is_allowed("https://www.flexhunt.co"));
        assert!(allowed.is_allowed("https://www.flexhunt.co/"));
        assert!(!allowed.is_allowed("http://flexhunt.co"));
        assert!(!allowed.is_allowed("https://evil.example"));
        assert!(!allowed.is_allowed("https://flexhunt.co.evil.example"));
        assert!(!allowed.is_allowed("null"));
    }

    #[test]
    fn test_www_entries_in_config_are_canonicalized() {
        let allowed = AllowedOrigins::new(&[
            "https://www.flexhunt.co/".to_string(),
            "not an origin".to_string(),
        ]);
        assert!(allowed.is_allowed("https://flexhunt.co"));
        assert!(!allowed.is_allowed("not an origin"));
    }
}

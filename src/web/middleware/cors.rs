//! CORS middleware configuration.

use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderName;
use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use super::auth::TOKEN_HEADER;

const METHODS: [Method; 4] = [Method::GET, Method::POST, Method::PUT, Method::OPTIONS];

fn any_origin() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(METHODS)
        .allow_headers(Any)
        .allow_origin(Any)
}

/// Build the CORS layer for the configured origins.
///
/// An empty list allows any origin without credentials.
pub fn create_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return any_origin();
    }

    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    if allowed.is_empty() {
        tracing::warn!("No valid CORS origin in {:?}; allowing any origin", origins);
        return any_origin();
    }

    CorsLayer::new()
        .allow_methods(METHODS)
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            HeaderName::from_static(TOKEN_HEADER),
        ])
        .allow_credentials(true)
        .allow_origin(allowed)
}

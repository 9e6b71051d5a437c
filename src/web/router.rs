//! Router configuration for the HTTP API.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    connect, disconnect, get_file_data, get_index, get_me, get_show, get_stats, get_status,
    post_upload, post_user, put_publish, put_unpublish, AppState,
};
use super::middleware::create_cors_layer;

/// Create the API router.
///
/// Every route is registered exactly once; publish and unpublish are separate routes.
pub fn create_router(
    app_state: Arc<AppState>,
    cors_origins: &[String],
    max_body_bytes: usize,
) -> Router {
    let app_routes = Router::new()
        .route("/status", get(get_status))
        .route("/stats", get(get_stats));

    let user_routes = Router::new()
        .route("/users", post(post_user))
        .route("/users/me", get(get_me))
        .route("/connect", get(connect))
        .route("/disconnect", get(disconnect));

    let file_routes = Router::new()
        .route("/files", post(post_upload).get(get_index))
        .route("/files/:id", get(get_show))
        .route("/files/:id/publish", put(put_publish))
        .route("/files/:id/unpublish", put(put_unpublish))
        .route("/files/:id/data", get(get_file_data));

    Router::new()
        .merge(app_routes)
        .merge(user_routes)
        .merge(file_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(app_state)
}

//! Session handlers.

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;

use crate::auth::{authenticate, parse_basic_credentials};
use crate::db::UserRepository;
use crate::web::dto::TokenResponse;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// GET /connect - Exchange Basic credentials for a session token.
pub async fn connect(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, ApiError> {
    let credentials = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_credentials)
        .ok_or_else(ApiError::unauthorized)?;

    let repo = UserRepository::new(state.db.pool());
    let user = authenticate(&repo, &credentials.email, &credentials.password)
        .await?
        .ok_or_else(|| {
            tracing::debug!("Rejected credentials");
            ApiError::unauthorized()
        })?;

    let token = state.sessions.issue(user.id).await?;
    tracing::info!("User {} connected", user.id);

    Ok(Json(TokenResponse { token }))
}

/// GET /disconnect - Revoke the caller's session token.
pub async fn disconnect(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    state.sessions.revoke(&auth.token).await?;
    tracing::info!("User {} disconnected", auth.user.id);
    Ok(StatusCode::NO_CONTENT)
}

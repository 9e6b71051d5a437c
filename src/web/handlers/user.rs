//! User handlers.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::auth::register;
use crate::db::UserRepository;
use crate::web::dto::{JsonBody, RegisterRequest, UserResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AuthUser;

/// POST /users - Register a new user.
pub async fn post_user(
    State(state): State<Arc<AppState>>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let repo = UserRepository::new(state.db.pool());
    let user = register(&repo, &request.into()).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// GET /users/me - The authenticated user.
pub async fn get_me(auth: AuthUser) -> Json<UserResponse> {
    Json(UserResponse::from(&auth.user))
}

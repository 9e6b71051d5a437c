//! Service status handlers.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::db::UserRepository;
use crate::file::FileRepository;
use crate::web::dto::{StatsResponse, StatusResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// GET /status - Reachability of the session store and the database.
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let (redis, db) = tokio::join!(state.sessions.ping(), state.db.ping());
    Json(StatusResponse { redis, db })
}

/// GET /stats - Number of users and files.
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let users = UserRepository::new(state.db.pool()).count().await?;
    let files = FileRepository::new(state.db.pool()).count().await?;
    Ok(Json(StatsResponse { users, files }))
}

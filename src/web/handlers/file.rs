//! File handlers.

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::file::RequestedParent;
use crate::web::dto::{
    FileDataQuery, FileResponse, JsonBody, ListFilesQuery, UploadFileRequest,
};
use crate::web::error::ApiError;
use crate::web::handlers::{parse_id, AppState};
use crate::web::middleware::{AuthUser, OptionalAuthUser};

/// POST /files - Upload a file or image, or create a folder.
pub async fn post_upload(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    JsonBody(request): JsonBody<UploadFileRequest>,
) -> Result<(StatusCode, Json<FileResponse>), ApiError> {
    let record = state.files.create(auth.user.id, request.into()).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// GET /files/:id - One of the caller's records.
pub async fn get_show(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, ApiError> {
    let record = state.files.get(auth.user.id, parse_id(&id)?).await?;
    Ok(Json(record.into()))
}

/// GET /files - One page of the caller's records under a parent.
pub async fn get_index(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListFilesQuery>,
) -> Result<Json<Vec<FileResponse>>, ApiError> {
    let RequestedParent::Valid(parent) = query.parent() else {
        // Names no folder, so it has no children.
        return Ok(Json(Vec::new()));
    };

    let records = state
        .files
        .list(auth.user.id, parent, query.page())
        .await?;
    Ok(Json(records.into_iter().map(FileResponse::from).collect()))
}

/// PUT /files/:id/publish - Make a record public.
pub async fn put_publish(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, ApiError> {
    let record = state
        .files
        .set_public(auth.user.id, parse_id(&id)?, true)
        .await?;
    Ok(Json(record.into()))
}

/// PUT /files/:id/unpublish - Make a record private.
pub async fn put_unpublish(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Json<FileResponse>, ApiError> {
    let record = state
        .files
        .set_public(auth.user.id, parse_id(&id)?, false)
        .await?;
    Ok(Json(record.into()))
}

/// GET /files/:id/data - Raw content, or a thumbnail with `?size=500|250|100`.
pub async fn get_file_data(
    State(state): State<Arc<AppState>>,
    OptionalAuthUser(user): OptionalAuthUser,
    Path(id): Path<String>,
    Query(query): Query<FileDataQuery>,
) -> Result<Response, ApiError> {
    let requester = user.map(|u| u.id);
    let content = state
        .files
        .read_content(requester, parse_id(&id)?, query.size())
        .await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content.content_type)
        .header(header::CONTENT_LENGTH, content.bytes.len())
        .body(Body::from(content.bytes))
        .map_err(ApiError::internal)
}

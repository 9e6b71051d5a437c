//! Token authentication extractors.
//!
//! The session token is read from the `X-Token` header, or from
//! `Authorization: Bearer <token>` when `X-Token` is absent.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::db::{User, UserRepository};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Header carrying the session token.
pub const TOKEN_HEADER: &str = "x-token";

/// Extract the session token from request headers.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers.get(TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Resolve `token` to its user, or fail with 401.
async fn resolve_user(state: &AppState, token: &str) -> Result<User, ApiError> {
    let user_id = state
        .sessions
        .resolve(token)
        .await?
        .ok_or_else(ApiError::unauthorized)?;

    // A session can outlive the user it points at.
    UserRepository::new(state.db.pool())
        .get_by_id(user_id)
        .await?
        .ok_or_else(ApiError::unauthorized)
}

/// Extractor for authenticated users.
///
/// Rejects with 401 when the token is missing, unknown or expired.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub token: String,
    pub user: User,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or_else(ApiError::unauthorized)?;
        let user = resolve_user(state, &token).await?;
        Ok(AuthUser { token, user })
    }
}

/// Optional authentication extractor.
///
/// No token means an anonymous caller; a token that does not resolve is still rejected with 401.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<User>);

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for OptionalAuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match extract_token(&parts.headers) {
            None => Ok(OptionalAuthUser(None)),
            Some(token) => Ok(OptionalAuthUser(Some(resolve_user(state, &token).await?))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_x_token() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("abc123"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_extract_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(extract_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_x_token_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, HeaderValue::from_static("from-x"));
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-bearer"));
        assert_eq!(extract_token(&headers).as_deref(), Some("from-x"));
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(extract_token(&headers), None);

        headers.insert(TOKEN_HEADER, HeaderValue::from_static(""));
        assert_eq!(extract_token(&headers), None);
    }
}

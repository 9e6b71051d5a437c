//! Middleware and extractors for the HTTP API.

pub mod auth;
pub mod cors;

pub use auth::{extract_token, AuthUser, OptionalAuthUser, TOKEN_HEADER};
pub use cors::create_cors_layer;

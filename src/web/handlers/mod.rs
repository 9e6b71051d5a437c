//! API handlers.

pub mod app;
pub mod auth;
pub mod file;
pub mod user;

pub use app::*;
pub use auth::*;
pub use file::*;
pub use user::*;

use crate::auth::SessionManager;
use crate::db::Database;
use crate::file::FileService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub sessions: SessionManager,
    pub files: FileService,
}

impl AppState {
    pub fn new(db: Database, sessions: SessionManager, files: FileService) -> Self {
        Self {
            db,
            sessions,
            files,
        }
    }
}

/// Parse an id path segment; anything that is not an integer names no record.
pub(crate) fn parse_id(raw: &str) -> Result<i64, crate::web::ApiError> {
    raw.parse().map_err(|_| crate::web::ApiError::not_found())
}

//! Response DTOs for the HTTP API.

use serde::Serialize;

use crate::db::User;
use crate::file::FileRecord;

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
        }
    }
}

/// Session token issued by `/connect`.
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Wire representation of a file record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub file_type: String,
    pub is_public: bool,
    /// `0` for the root.
    pub parent_id: i64,
}

impl From<FileRecord> for FileResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.owner_id,
            name: record.name,
            file_type: record.file_type.as_str().to_string(),
            is_public: record.is_public,
            parent_id: record.parent.as_id(),
        }
    }
}

/// Reachability of the backing stores.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub redis: bool,
    pub db: bool,
}

/// Record counts.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub users: i64,
    pub files: i64,
}

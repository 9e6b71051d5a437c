//! Request DTOs for the HTTP API.

use serde::Deserialize;
use serde_json::Value;

use crate::auth::RegistrationRequest;
use crate::file::{ParentRef, RequestedParent, UploadRequest};

/// User registration request.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl From<RegisterRequest> for RegistrationRequest {
    fn from(req: RegisterRequest) -> Self {
        RegistrationRequest {
            email: req.email,
            password: req.password,
        }
    }
}

/// Body of `POST /files`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub file_type: Option<String>,
    /// Number or numeric string; `0` or absent is the root.
    #[serde(default)]
    pub parent_id: Option<Value>,
    #[serde(default)]
    pub is_public: Option<bool>,
    /// Base64-encoded content.
    #[serde(default)]
    pub data: Option<String>,
}

/// Interpret a `parentId` given as a JSON number or a string.
pub fn parse_parent_value(value: Option<&Value>) -> RequestedParent {
    match value {
        None | Some(Value::Null) => RequestedParent::Valid(ParentRef::Root),
        Some(Value::Number(n)) => n
            .as_i64()
            .map_or(RequestedParent::Malformed, |id| {
                RequestedParent::Valid(ParentRef::from_id(id))
            }),
        Some(Value::String(s)) => parse_parent_str(Some(s.as_str())),
        Some(_) => RequestedParent::Malformed,
    }
}

/// Interpret a `parentId` given as text, e.g. in a query string.
pub fn parse_parent_str(value: Option<&str>) -> RequestedParent {
    match value.map(str::trim) {
        None | Some("") => RequestedParent::Valid(ParentRef::Root),
        Some(s) => s
            .parse::<i64>()
            .map_or(RequestedParent::Malformed, |id| {
                RequestedParent::Valid(ParentRef::from_id(id))
            }),
    }
}

impl From<UploadFileRequest> for UploadRequest {
    fn from(req: UploadFileRequest) -> Self {
        UploadRequest {
            parent: parse_parent_value(req.parent_id.as_ref()),
            name: req.name,
            file_type: req.file_type,
            is_public: req.is_public.unwrap_or(false),
            data: req.data,
        }
    }
}

/// Query of `GET /files`.
///
/// Kept as text so malformed values can be handled instead of rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesQuery {
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

impl ListFilesQuery {
    pub fn parent(&self) -> RequestedParent {
        parse_parent_str(self.parent_id.as_deref())
    }

    /// Zero-based page; anything that is not a non-negative number is page 0.
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(0)
    }
}

/// Query of `GET /files/:id/data`.
#[derive(Debug, Default, Deserialize)]
pub struct FileDataQuery {
    #[serde(default)]
    pub size: Option<String>,
}

impl FileDataQuery {
    pub fn size(&self) -> Option<u32> {
        self.size.as_deref().and_then(|s| s.trim().parse().ok())
    }
}

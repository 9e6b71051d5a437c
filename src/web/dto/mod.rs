//! JSON bodies and query strings of the HTTP API.

mod body;
mod request;
mod response;

pub use body::JsonBody;
pub use request::{
    parse_parent_str, parse_parent_value, FileDataQuery, ListFilesQuery, RegisterRequest,
    UploadFileRequest,
};
pub use response::{FileResponse, StatsResponse, StatusResponse, TokenResponse, UserResponse};

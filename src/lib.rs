//! filevault - personal file storage service
//!
//! Users store files, folders and images, share them publicly per file,
//! and get thumbnails generated in the background for every image upload.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod queue;
pub mod thumbnail;
pub mod web;

pub use auth::{
    authenticate, hash_password, register, verify_password, InMemorySessionStore,
    RegistrationError, RegistrationRequest, SessionError, SessionManager, SessionStore,
};
pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{Result, VaultError};
pub use file::{BlobStore, FileRecord, FileService, FileType, LocalBlobStore, ParentRef};
pub use queue::{JobQueue, QueueRunner};
pub use thumbnail::{ThumbnailJob, ThumbnailWorker};
pub use web::{AppState, WebServer};

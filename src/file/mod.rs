//! File management module for filevault.
//!
//! This module provides:
//! - File, folder and image records with owner-scoped access
//! - Blob storage with generated locators
//! - The file service used by the HTTP API

mod metadata;
mod service;
mod storage;

pub use metadata::{FileRecord, FileRepository, FileType, NewFile, ParentRef};
pub use service::{
    Field, FileContent, FileError, FileService, RequestedParent, UploadRequest,
};
pub use storage::{generate_locator, variant_locator, BlobStore, LocalBlobStore};

/// Records per page when listing.
pub const PAGE_SIZE: i64 = 20;

/// Widths of the generated image thumbnails, in pixels.
pub const THUMBNAIL_WIDTHS: [u32; 3] = [500, 250, 100];

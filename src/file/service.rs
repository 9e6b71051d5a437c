//! File service for filevault.
//!
//! This module provides the file operations behind the HTTP API:
//! - Upload with field validation, parent checks and thumbnail scheduling
//! - Owner-scoped lookup, listing and visibility changes
//! - Content retrieval honouring visibility

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::Database;
use crate::queue::JobQueue;
use crate::thumbnail::ThumbnailJob;
use crate::VaultError;

use super::metadata::{FileRecord, FileRepository, FileType, NewFile, ParentRef};
use super::storage::{generate_locator, variant_locator, BlobStore};
use super::{PAGE_SIZE, THUMBNAIL_WIDTHS};

/// Upload field that can be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Type,
    Data,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Type => "type",
            Field::Data => "data",
        }
    }
}

/// File operation errors.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Missing {}", .0.as_str())]
    MissingField(Field),

    /// Content is not valid base64.
    #[error("Invalid data")]
    InvalidData,

    #[error("Parent not found")]
    ParentNotFound,

    #[error("Parent is not a folder")]
    ParentNotAFolder,

    /// Absent, or not visible to the caller.
    #[error("Not found")]
    NotFound,

    #[error("A folder doesn't have content")]
    NoContent,

    /// Metadata or blob store failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<VaultError> for FileError {
    fn from(e: VaultError) -> Self {
        FileError::Internal(e.to_string())
    }
}

/// Parent folder as supplied by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedParent {
    Valid(ParentRef),
    /// An id that cannot name any record (e.g. not a number).
    Malformed,
}

impl Default for RequestedParent {
    fn default() -> Self {
        RequestedParent::Valid(ParentRef::Root)
    }
}

/// Request data for an upload. Fields are optional so each absence can be reported.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    pub name: Option<String>,
    pub file_type: Option<String>,
    pub parent: RequestedParent,
    pub is_public: bool,
    /// Base64-encoded content; required for files and images.
    pub data: Option<String>,
}

impl UploadRequest {
    pub fn new(name: impl Into<String>, file_type: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            file_type: Some(file_type.into()),
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_parent(mut self, parent: ParentRef) -> Self {
        self.parent = RequestedParent::Valid(parent);
        self
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }
}

/// Content of a file ready to be sent.
#[derive(Debug, Clone)]
pub struct FileContent {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// File service over the metadata store, the blob store and the thumbnail queue.
#[derive(Clone)]
pub struct FileService {
    db: Database,
    blobs: Arc<dyn BlobStore>,
    thumbnails: JobQueue<ThumbnailJob>,
}

impl FileService {
    pub fn new(db: Database, blobs: Arc<dyn BlobStore>, thumbnails: JobQueue<ThumbnailJob>) -> Self {
        Self {
            db,
            blobs,
            thumbnails,
        }
    }

    fn repo(&self) -> FileRepository<'_> {
        FileRepository::new(self.db.pool())
    }

    /// Create a file, folder or image owned by `owner_id`.
    ///
    /// Validation order: name, type, data (non-folders), parent.
    /// Content is written to the blob store before the record is persisted;
    /// images then get a thumbnail job.
    pub async fn create(
        &self,
        owner_id: i64,
        request: UploadRequest,
    ) -> Result<FileRecord, FileError> {
        let name = request
            .name
            .filter(|n| !n.is_empty())
            .ok_or(FileError::MissingField(Field::Name))?;
        let file_type: FileType = request
            .file_type
            .as_deref()
            .and_then(|t| t.parse().ok())
            .ok_or(FileError::MissingField(Field::Type))?;
        let data = if file_type.has_content() {
            Some(request.data.ok_or(FileError::MissingField(Field::Data))?)
        } else {
            None
        };

        let parent = match request.parent {
            RequestedParent::Malformed => return Err(FileError::ParentNotFound),
            RequestedParent::Valid(ParentRef::Root) => ParentRef::Root,
            RequestedParent::Valid(ParentRef::Folder(parent_id)) => {
                let parent = self
                    .repo()
                    .get_owned(parent_id, owner_id)
                    .await?
                    .ok_or(FileError::ParentNotFound)?;
                if parent.file_type != FileType::Folder {
                    return Err(FileError::ParentNotAFolder);
                }
                ParentRef::Folder(parent.id)
            }
        };

        let Some(data) = data else {
            let record = self
                .repo()
                .create(
                    &NewFile::folder(owner_id, name)
                        .in_parent(parent)
                        .public(request.is_public),
                )
                .await?;
            debug!("Folder {} created for user {}", record.id, owner_id);
            return Ok(record);
        };

        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|_| FileError::InvalidData)?;
        let locator = generate_locator();
        self.blobs.create(&locator, &bytes).await?;

        let record = self
            .repo()
            .create(
                &NewFile::with_content(owner_id, name, file_type, &locator)
                    .in_parent(parent)
                    .public(request.is_public),
            )
            .await?;
        info!(
            "{} {} stored for user {} ({} bytes)",
            file_type,
            record.id,
            owner_id,
            bytes.len()
        );

        if file_type == FileType::Image {
            // Startup reconciliation picks up images whose job was lost.
            if let Err(e) = self.thumbnails.enqueue(ThumbnailJob::new(owner_id, record.id)) {
                warn!("Thumbnail job for file {} not queued: {}", record.id, e);
            }
        }

        Ok(record)
    }

    /// Get a record owned by `owner_id`.
    pub async fn get(&self, owner_id: i64, file_id: i64) -> Result<FileRecord, FileError> {
        self.repo()
            .get_owned(file_id, owner_id)
            .await?
            .ok_or(FileError::NotFound)
    }

    /// One page of the children of `parent`, in creation order.
    pub async fn list(
        &self,
        owner_id: i64,
        parent: ParentRef,
        page: u32,
    ) -> Result<Vec<FileRecord>, FileError> {
        let offset = i64::from(page) * PAGE_SIZE;
        Ok(self
            .repo()
            .list_children(owner_id, parent, offset, PAGE_SIZE)
            .await?)
    }

    /// Set the visibility of a record owned by `owner_id`.
    pub async fn set_public(
        &self,
        owner_id: i64,
        file_id: i64,
        is_public: bool,
    ) -> Result<FileRecord, FileError> {
        self.repo()
            .set_public(file_id, owner_id, is_public)
            .await?
            .ok_or(FileError::NotFound)
    }

    /// Read the content of a file or one of its thumbnails.
    ///
    /// Private files are only visible to their owner; everyone else gets
    /// `NotFound`. A `size` that is not a thumbnail width selects the original.
    pub async fn read_content(
        &self,
        requester_id: Option<i64>,
        file_id: i64,
        size: Option<u32>,
    ) -> Result<FileContent, FileError> {
        let record = self
            .repo()
            .get_by_id(file_id)
            .await?
            .ok_or(FileError::NotFound)?;

        let Some(locator) = record.blob_locator.as_deref() else {
            return Err(FileError::NoContent);
        };

        if !record.is_public && requester_id != Some(record.owner_id) {
            return Err(FileError::NotFound);
        }

        let variant = size.filter(|width| THUMBNAIL_WIDTHS.contains(width));
        let target = match variant {
            Some(width) => variant_locator(locator, width),
            None => locator.to_string(),
        };

        let bytes = self
            .blobs
            .read(&target)
            .await?
            .ok_or(FileError::NotFound)?;

        // Thumbnails may be re-encoded, so their type comes from the bytes.
        let sniffed = variant
            .and_then(|_| image::guess_format(&bytes).ok())
            .map(|format| format.to_mime_type().to_string());
        let content_type = sniffed.unwrap_or_else(|| {
            mime_guess::from_path(&record.name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        Ok(FileContent {
            bytes,
            content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::file::LocalBlobStore;
    use crate::queue::JobReceiver;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        service: FileService,
        blobs: Arc<LocalBlobStore>,
        jobs: JobReceiver<ThumbnailJob>,
        alice: i64,
        bob: i64,
    }

    async fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().await.unwrap();
        let users = UserRepository::new(db.pool());
        let alice = users.create(&NewUser::new("alice@x.com", "h")).await.unwrap().id;
        let bob = users.create(&NewUser::new("bob@x.com", "h")).await.unwrap().id;

        let blobs = Arc::new(LocalBlobStore::new(dir.path(), Duration::from_secs(5)).unwrap());
        let (queue, jobs) = JobQueue::channel();
        let service = FileService::new(db, blobs.clone(), queue);
        Fixture {
            _dir: dir,
            service,
            blobs,
            jobs,
            alice,
            bob,
        }
    }

    fn b64(bytes: &[u8]) -> String {
        STANDARD.encode(bytes)
    }

    #[tokio::test]
    async fn test_validation_order() {
        let f = fixture().await;

        let err = f
            .service
            .create(f.alice, UploadRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::MissingField(Field::Name)));

        let request = UploadRequest {
            name: Some("x".into()),
            data: Some(b64(b"abc")),
            ..Default::default()
        };
        let err = f.service.create(f.alice, request).await.unwrap_err();
        assert!(matches!(err, FileError::MissingField(Field::Type)));

        let err = f
            .service
            .create(f.alice, UploadRequest::new("x", "document"))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::MissingField(Field::Type)));

        let err = f
            .service
            .create(f.alice, UploadRequest::new("x", "file"))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::MissingField(Field::Data)));
        assert_eq!(err.to_string(), "Missing data");
    }

    #[tokio::test]
    async fn test_folder_needs_no_data() {
        let f = fixture().await;
        let folder = f
            .service
            .create(f.alice, UploadRequest::new("docs", "folder"))
            .await
            .unwrap();
        assert_eq!(folder.file_type, FileType::Folder);
        assert!(folder.blob_locator.is_none());
    }

    #[tokio::test]
    async fn test_upload_file_writes_blob() {
        let f = fixture().await;
        let record = f
            .service
            .create(
                f.alice,
                UploadRequest::new("hello.txt", "file").with_data(b64(b"Hello")),
            )
            .await
            .unwrap();

        let locator = record.blob_locator.clone().unwrap();
        assert_eq!(f.blobs.read(&locator).await.unwrap().unwrap(), b"Hello");
        assert_eq!(f.service.get(f.alice, record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_invalid_base64() {
        let f = fixture().await;
        let err = f
            .service
            .create(
                f.alice,
                UploadRequest::new("a.txt", "file").with_data("%%% not base64"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::InvalidData));
    }

    #[tokio::test]
    async fn test_parent_rules() {
        let f = fixture().await;
        let file = f
            .service
            .create(f.alice, UploadRequest::new("a.txt", "file").with_data(b64(b"x")))
            .await
            .unwrap();
        let bobs_folder = f
            .service
            .create(f.bob, UploadRequest::new("shared", "folder"))
            .await
            .unwrap();

        let err = f
            .service
            .create(
                f.alice,
                UploadRequest::new("b", "folder").with_parent(ParentRef::Folder(9999)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::ParentNotFound));

        let err = f
            .service
            .create(
                f.alice,
                UploadRequest::new("b", "folder").with_parent(ParentRef::Folder(file.id)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::ParentNotAFolder));

        // Someone else's folder is not a valid parent
        let err = f
            .service
            .create(
                f.alice,
                UploadRequest::new("b", "folder").with_parent(ParentRef::Folder(bobs_folder.id)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::ParentNotFound));

        let request = UploadRequest {
            parent: RequestedParent::Malformed,
            ..UploadRequest::new("b", "folder")
        };
        let err = f.service.create(f.alice, request).await.unwrap_err();
        assert!(matches!(err, FileError::ParentNotFound));
    }

    #[tokio::test]
    async fn test_image_upload_enqueues_job() {
        let mut f = fixture().await;
        let text = f
            .service
            .create(f.alice, UploadRequest::new("a.txt", "file").with_data(b64(b"x")))
            .await
            .unwrap();
        let image = f
            .service
            .create(f.alice, UploadRequest::new("a.png", "image").with_data(b64(b"png")))
            .await
            .unwrap();
        assert_ne!(text.id, image.id);

        let envelope = f.jobs.recv().await.unwrap();
        assert_eq!(envelope.job, ThumbnailJob::new(f.alice, image.id));
    }

    #[tokio::test]
    async fn test_get_scoped_to_owner() {
        let f = fixture().await;
        let folder = f
            .service
            .create(f.alice, UploadRequest::new("docs", "folder"))
            .await
            .unwrap();

        assert!(matches!(
            f.service.get(f.bob, folder.id).await,
            Err(FileError::NotFound)
        ));
        assert!(matches!(
            f.service.get(f.alice, 12345).await,
            Err(FileError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_list_pages() {
        let f = fixture().await;
        let mut created = Vec::new();
        for i in 0..45 {
            let r = f
                .service
                .create(f.alice, UploadRequest::new(format!("f{i}"), "folder"))
                .await
                .unwrap();
            created.push(r.id);
        }

        let mut seen = Vec::new();
        for page in 0..4 {
            let items = f.service.list(f.alice, ParentRef::Root, page).await.unwrap();
            assert!(items.len() <= PAGE_SIZE as usize);
            seen.extend(items.into_iter().map(|r| r.id));
        }
        assert_eq!(seen, created);
        assert!(f
            .service
            .list(f.bob, ParentRef::Root, 0)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_publish_roundtrip() {
        let f = fixture().await;
        let record = f
            .service
            .create(f.alice, UploadRequest::new("a.txt", "file").with_data(b64(b"x")))
            .await
            .unwrap();
        assert!(!record.is_public);

        let published = f.service.set_public(f.alice, record.id, true).await.unwrap();
        assert!(published.is_public);
        let again = f.service.set_public(f.alice, record.id, true).await.unwrap();
        assert_eq!(again, published);

        let unpublished = f.service.set_public(f.alice, record.id, false).await.unwrap();
        assert_eq!(unpublished, record);
        let again = f.service.set_public(f.alice, record.id, false).await.unwrap();
        assert_eq!(again, record);

        assert!(matches!(
            f.service.set_public(f.bob, record.id, true).await,
            Err(FileError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_read_content_visibility() {
        let f = fixture().await;
        let record = f
            .service
            .create(f.alice, UploadRequest::new("a.txt", "file").with_data(b64(b"secret")))
            .await
            .unwrap();

        let content = f
            .service
            .read_content(Some(f.alice), record.id, None)
            .await
            .unwrap();
        assert_eq!(content.bytes, b"secret");
        assert_eq!(content.content_type, "text/plain");

        assert!(matches!(
            f.service.read_content(Some(f.bob), record.id, None).await,
            Err(FileError::NotFound)
        ));
        assert!(matches!(
            f.service.read_content(None, record.id, None).await,
            Err(FileError::NotFound)
        ));

        f.service.set_public(f.alice, record.id, true).await.unwrap();
        let content = f.service.read_content(None, record.id, None).await.unwrap();
        assert_eq!(content.bytes, b"secret");
    }

    #[tokio::test]
    async fn test_read_content_folder() {
        let f = fixture().await;
        let folder = f
            .service
            .create(f.alice, UploadRequest::new("docs", "folder"))
            .await
            .unwrap();
        assert!(matches!(
            f.service.read_content(Some(f.alice), folder.id, None).await,
            Err(FileError::NoContent)
        ));
    }

    #[tokio::test]
    async fn test_read_content_sizes() {
        let f = fixture().await;
        let record = f
            .service
            .create(f.alice, UploadRequest::new("a.png", "image").with_data(b64(b"orig")))
            .await
            .unwrap();
        let locator = record.blob_locator.clone().unwrap();

        // Variant not generated yet
        assert!(matches!(
            f.service.read_content(Some(f.alice), record.id, Some(250)).await,
            Err(FileError::NotFound)
        ));

        f.blobs
            .write(&variant_locator(&locator, 250), b"small")
            .await
            .unwrap();
        let small = f
            .service
            .read_content(Some(f.alice), record.id, Some(250))
            .await
            .unwrap();
        assert_eq!(small.bytes, b"small");
        assert_eq!(small.content_type, "image/png");

        // Unsupported width falls back to the original
        let fallback = f
            .service
            .read_content(Some(f.alice), record.id, Some(75))
            .await
            .unwrap();
        assert_eq!(fallback.bytes, b"orig");
    }

    #[tokio::test]
    async fn test_variant_type_comes_from_bytes() {
        let f = fixture().await;
        let record = f
            .service
            .create(f.alice, UploadRequest::new("anim.gif", "image").with_data(b64(b"orig")))
            .await
            .unwrap();
        let locator = record.blob_locator.clone().unwrap();

        let mut png = std::io::Cursor::new(Vec::new());
        image::RgbImage::new(4, 4)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        f.blobs
            .write(&variant_locator(&locator, 100), png.get_ref())
            .await
            .unwrap();

        let thumb = f
            .service
            .read_content(Some(f.alice), record.id, Some(100))
            .await
            .unwrap();
        assert_eq!(thumb.content_type, "image/png");

        let original = f
            .service
            .read_content(Some(f.alice), record.id, None)
            .await
            .unwrap();
        assert_eq!(original.content_type, "image/gif");
    }
}

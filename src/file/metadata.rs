//! File records and their repository.

use std::fmt;
use std::str::FromStr;

use sqlx::SqlitePool;

use crate::{Result, VaultError};

/// Kind of a file record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    File,
    Folder,
    Image,
}

impl FileType {
    /// Database and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::File => "file",
            FileType::Folder => "folder",
            FileType::Image => "image",
        }
    }

    /// Whether records of this type carry content in the blob store.
    pub fn has_content(&self) -> bool {
        !matches!(self, FileType::Folder)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "file" => Ok(FileType::File),
            "folder" => Ok(FileType::Folder),
            "image" => Ok(FileType::Image),
            _ => Err(format!("unknown file type: {s}")),
        }
    }
}

/// Where a record sits in its owner's tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParentRef {
    /// Top level.
    #[default]
    Root,
    /// Inside the folder with this id.
    Folder(i64),
}

impl ParentRef {
    /// Map an external id, where `0` stands for the root.
    pub fn from_id(id: i64) -> Self {
        if id == 0 {
            ParentRef::Root
        } else {
            ParentRef::Folder(id)
        }
    }

    /// External id, `0` for the root.
    pub fn as_id(&self) -> i64 {
        match self {
            ParentRef::Root => 0,
            ParentRef::Folder(id) => *id,
        }
    }

    fn from_column(value: Option<i64>) -> Self {
        value.map_or(ParentRef::Root, ParentRef::Folder)
    }

    fn as_column(&self) -> Option<i64> {
        match self {
            ParentRef::Root => None,
            ParentRef::Folder(id) => Some(*id),
        }
    }
}

/// A stored file, folder or image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    pub owner_id: i64,
    pub name: String,
    pub file_type: FileType,
    pub is_public: bool,
    pub parent: ParentRef,
    /// Blob name of the content; `None` exactly for folders.
    pub blob_locator: Option<String>,
    pub created_at: String,
}

#[derive(sqlx::FromRow)]
struct FileRow {
    id: i64,
    user_id: i64,
    name: String,
    file_type: String,
    is_public: bool,
    parent_id: Option<i64>,
    blob_locator: Option<String>,
    created_at: String,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = VaultError;

    fn try_from(row: FileRow) -> Result<Self> {
        let file_type = row.file_type.parse().map_err(VaultError::Database)?;
        Ok(FileRecord {
            id: row.id,
            owner_id: row.user_id,
            name: row.name,
            file_type,
            is_public: row.is_public,
            parent: ParentRef::from_column(row.parent_id),
            blob_locator: row.blob_locator,
            created_at: row.created_at,
        })
    }
}

/// Data for creating a new file record.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub owner_id: i64,
    pub name: String,
    pub file_type: FileType,
    pub is_public: bool,
    pub parent: ParentRef,
    pub blob_locator: Option<String>,
}

impl NewFile {
    /// A folder record (never has a blob).
    pub fn folder(owner_id: i64, name: impl Into<String>) -> Self {
        Self {
            owner_id,
            name: name.into(),
            file_type: FileType::Folder,
            is_public: false,
            parent: ParentRef::Root,
            blob_locator: None,
        }
    }

    /// A file or image record pointing at `blob_locator`.
    pub fn with_content(
        owner_id: i64,
        name: impl Into<String>,
        file_type: FileType,
        blob_locator: impl Into<String>,
    ) -> Self {
        Self {
            owner_id,
            name: name.into(),
            file_type,
            is_public: false,
            parent: ParentRef::Root,
            blob_locator: Some(blob_locator.into()),
        }
    }

    pub fn in_parent(mut self, parent: ParentRef) -> Self {
        self.parent = parent;
        self
    }

    pub fn public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, name, file_type, is_public, parent_id, blob_locator, created_at FROM files";

/// Repository for file records.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a record and return it as stored.
    pub async fn create(&self, file: &NewFile) -> Result<FileRecord> {
        let result = sqlx::query(
            "INSERT INTO files (user_id, name, file_type, is_public, parent_id, blob_locator)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(file.owner_id)
        .bind(&file.name)
        .bind(file.file_type.as_str())
        .bind(file.is_public)
        .bind(file.parent.as_column())
        .bind(&file.blob_locator)
        .execute(self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| VaultError::NotFound("file".to_string()))
    }

    /// Get a record by id regardless of owner.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Get a record by id only if `owner_id` owns it.
    pub async fn get_owned(&self, id: i64, owner_id: i64) -> Result<Option<FileRecord>> {
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "{SELECT_COLUMNS} WHERE id = ? AND user_id = ?"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(self.pool)
        .await?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Children of `parent` owned by `owner_id`, in id order.
    pub async fn list_children(
        &self,
        owner_id: i64,
        parent: ParentRef,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ? AND parent_id IS ?
             ORDER BY id ASC LIMIT ? OFFSET ?"
        ))
        .bind(owner_id)
        .bind(parent.as_column())
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(FileRecord::try_from).collect()
    }

    /// Set the visibility of a record owned by `owner_id`.
    ///
    /// Returns the updated record, or `None` if there is no such record for that owner.
    pub async fn set_public(
        &self,
        id: i64,
        owner_id: i64,
        is_public: bool,
    ) -> Result<Option<FileRecord>> {
        let result = sqlx::query("UPDATE files SET is_public = ? WHERE id = ? AND user_id = ?")
            .bind(is_public)
            .bind(id)
            .bind(owner_id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    /// Count all records.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Every image record, in id order.
    pub async fn list_images(&self) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "{SELECT_COLUMNS} WHERE file_type = 'image' ORDER BY id ASC"
        ))
        .fetch_all(self.pool)
        .await?;
        rows.into_iter().map(FileRecord::try_from).collect()
    }
}

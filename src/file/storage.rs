//! Blob storage for filevault.
//!
//! Blobs are addressed by a generated locator and kept flat under one root:
//! ```text
//! {root}/
//! ├── 0b6c1c0e-3f4e-4c55-9d39-0f8a7c1d2e3f
//! ├── 0b6c1c0e-3f4e-4c55-9d39-0f8a7c1d2e3f_500
//! ├── 0b6c1c0e-3f4e-4c55-9d39-0f8a7c1d2e3f_250
//! └── 0b6c1c0e-3f4e-4c55-9d39-0f8a7c1d2e3f_100
//! ```

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{Result, VaultError};

/// Persistence of raw bytes by locator.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write a new blob. Fails if `locator` is already taken.
    async fn create(&self, locator: &str, content: &[u8]) -> Result<()>;

    /// Write a blob, replacing any existing content.
    async fn write(&self, locator: &str, content: &[u8]) -> Result<()>;

    /// Check whether a blob exists.
    async fn exists(&self, locator: &str) -> Result<bool>;

    /// Read a blob. Missing blobs read as `None`.
    async fn read(&self, locator: &str) -> Result<Option<Vec<u8>>>;
}

/// Generate a fresh, globally unique locator.
pub fn generate_locator() -> String {
    Uuid::new_v4().to_string()
}

/// Locator of the resized rendition of `locator` at `width` pixels.
pub fn variant_locator(locator: &str, width: u32) -> String {
    format!("{locator}_{width}")
}

/// Blob store on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    io_timeout: Duration,
}

impl LocalBlobStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>, io_timeout: Duration) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, io_timeout })
    }

    fn path_for(&self, locator: &str) -> Result<PathBuf> {
        let valid = !locator.is_empty()
            && !locator.contains(['/', '\\', '\0'])
            && !locator.contains("..");
        if !valid {
            return Err(VaultError::Storage(format!("invalid locator: {locator:?}")));
        }
        Ok(self.root.join(locator))
    }

    async fn bounded<T, F>(&self, op: &str, locator: &str, fut: F) -> Result<T>
    where
        F: Future<Output = io::Result<T>>,
    {
        match tokio::time::timeout(self.io_timeout, fut).await {
            Ok(result) => result.map_err(VaultError::Io),
            Err(_) => Err(VaultError::Timeout(format!("blob {op} {locator}"))),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn create(&self, locator: &str, content: &[u8]) -> Result<()> {
        let path = self.path_for(locator)?;
        let result = self
            .bounded("create", locator, async {
                let mut file = fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .await?;
                file.write_all(content).await?;
                file.sync_all().await
            })
            .await;

        match result {
            Err(VaultError::Io(e)) if e.kind() == io::ErrorKind::AlreadyExists => Err(
                VaultError::Storage(format!("blob already exists: {locator}")),
            ),
            other => other,
        }
    }

    async fn write(&self, locator: &str, content: &[u8]) -> Result<()> {
        let path = self.path_for(locator)?;
        // Readers never see a half-written blob.
        let staging = self.root.join(format!(".{}.tmp", Uuid::new_v4()));
        let result = self
            .bounded("write", locator, async {
                fs::write(&staging, content).await?;
                fs::rename(&staging, &path).await
            })
            .await;

        if result.is_err() {
            let _ = fs::remove_file(&staging).await;
        }
        result
    }

    async fn exists(&self, locator: &str) -> Result<bool> {
        let path = self.path_for(locator)?;
        self.bounded("exists", locator, fs::try_exists(&path)).await
    }

    async fn read(&self, locator: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(locator)?;
        self.bounded("read", locator, async {
            match fs::read(&path).await {
                Ok(content) => Ok(Some(content)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
    }
}

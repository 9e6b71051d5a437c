//! Thumbnail job handler.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::{debug, info};

use super::resize::SourceImage;
use super::ThumbnailJob;
use crate::db::Database;
use crate::file::{variant_locator, BlobStore, FileRepository, THUMBNAIL_WIDTHS};
use crate::queue::{JobError, JobHandler};

/// Generates the thumbnails of one image per job.
///
/// Every variant is written under a fixed name, so running a job again
/// simply overwrites the previous output.
pub struct ThumbnailWorker {
    db: Database,
    blobs: Arc<dyn BlobStore>,
}

impl ThumbnailWorker {
    pub fn new(db: Database, blobs: Arc<dyn BlobStore>) -> Self {
        Self { db, blobs }
    }

    async fn generate(&self, user_id: i64, file_id: i64) -> Result<(), JobError> {
        let record = FileRepository::new(self.db.pool())
            .get_owned(file_id, user_id)
            .await
            .map_err(|e| JobError::Retryable(e.to_string()))?
            .ok_or_else(|| JobError::Fatal(format!("file {file_id} not found")))?;

        let locator = record
            .blob_locator
            .ok_or_else(|| JobError::Fatal(format!("file {file_id} has no content")))?;

        let original = self
            .blobs
            .read(&locator)
            .await
            .map_err(|e| JobError::Retryable(e.to_string()))?
            .ok_or_else(|| JobError::Retryable(format!("blob {locator} missing")))?;

        let source = tokio::task::spawn_blocking(move || SourceImage::decode(&original))
            .await
            .map_err(|e| JobError::Retryable(e.to_string()))?
            .map_err(|e| JobError::Fatal(e.to_string()))?;
        debug!("File {} decoded as {:?}", file_id, source.format());
        let source = Arc::new(source);

        let writes = THUMBNAIL_WIDTHS.iter().map(|&width| {
            let source = source.clone();
            let blobs = self.blobs.clone();
            let target = variant_locator(&locator, width);
            async move {
                let bytes = tokio::task::spawn_blocking(move || source.thumbnail(width))
                    .await
                    .map_err(|e| JobError::Retryable(e.to_string()))?
                    .map_err(|e| JobError::Fatal(e.to_string()))?;
                blobs
                    .write(&target, &bytes)
                    .await
                    .map_err(|e| JobError::Retryable(format!("write {target}: {e}")))?;
                debug!("Wrote {} ({} bytes)", target, bytes.len());
                Ok::<(), JobError>(())
            }
        });
        try_join_all(writes).await?;

        info!("Thumbnails generated for file {}", file_id);
        Ok(())
    }
}

#[async_trait]
impl JobHandler<ThumbnailJob> for ThumbnailWorker {
    async fn handle(&self, job: &ThumbnailJob) -> Result<(), JobError> {
        let Some(file_id) = job.file_id else {
            return Err(JobError::Fatal("Missing fileId".to_string()));
        };
        let Some(user_id) = job.user_id else {
            return Err(JobError::Fatal("Missing userId".to_string()));
        };
        self.generate(user_id, file_id).await
    }

    fn name(&self) -> &'static str {
        "thumbnail"
    }
}

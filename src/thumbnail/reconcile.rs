//! Startup reconciliation of missing thumbnails.

use tracing::{info, warn};

use super::ThumbnailJob;
use crate::db::Database;
use crate::file::{variant_locator, BlobStore, FileRepository, THUMBNAIL_WIDTHS};
use crate::queue::JobQueue;
use crate::{Result, VaultError};

/// Queue a job for every image whose original is stored but whose thumbnails are incomplete.
///
/// Covers uploads whose job was lost, e.g. to a restart before the worker ran.
/// Returns the number of jobs queued.
pub async fn requeue_missing(
    db: &Database,
    blobs: &dyn BlobStore,
    queue: &JobQueue<ThumbnailJob>,
) -> Result<usize> {
    let images = FileRepository::new(db.pool()).list_images().await?;
    let mut queued = 0;

    for image in images {
        let Some(locator) = image.blob_locator.as_deref() else {
            continue;
        };

        if !blobs.exists(locator).await? {
            warn!("Image {} has no stored original ({})", image.id, locator);
            continue;
        }

        let mut complete = true;
        for width in THUMBNAIL_WIDTHS {
            if !blobs.exists(&variant_locator(locator, width)).await? {
                complete = false;
                break;
            }
        }
        if complete {
            continue;
        }

        queue
            .enqueue(ThumbnailJob::new(image.owner_id, image.id))
            .map_err(|e| VaultError::Storage(e.to_string()))?;
        queued += 1;
    }

    if queued > 0 {
        info!("Queued {} image(s) with missing thumbnails", queued);
    }
    Ok(queued)
}

//! Thumbnail generation for uploaded images.
//!
//! Each image upload queues a [`ThumbnailJob`]; the [`ThumbnailWorker`]
//! reads the original blob and writes one resized copy per width in
//! [`THUMBNAIL_WIDTHS`](crate::file::THUMBNAIL_WIDTHS) next to it.

mod reconcile;
mod resize;
mod worker;

pub use reconcile::requeue_missing;
pub use worker::ThumbnailWorker;

use serde::{Deserialize, Serialize};

/// Request to generate thumbnails for one image.
///
/// Both fields are optional on the wire; a job missing either one fails permanently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailJob {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub file_id: Option<i64>,
}

impl ThumbnailJob {
    pub fn new(user_id: i64, file_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            file_id: Some(file_id),
        }
    }
}

use async_trait::async_trait;
use uuid::Uuid;
use vidshare_core::{AppError, NewStoredFile, Resolution, StoredFile, Video, VideoId};

/// Read side of the record store plus the entry point for a unit of work.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Load a video with its owner id and its origin and thumbnail files.
    async fn find_video(&self, id: &VideoId) -> Result<Option<Video>, AppError>;

    /// Open a transaction. Nothing written through it is visible until commit.
    async fn begin(&self) -> Result<Box<dyn VideoTransaction>, AppError>;
}

/// One job's writes, committed or rolled back together.
#[async_trait]
pub trait VideoTransaction: Send {
    async fn insert_stored_file(&mut self, file: NewStoredFile) -> Result<StoredFile, AppError>;

    /// `ORIGINAL_UPLOADED` → `THUMBNAIL_GENERATED`, linking the thumbnail file.
    ///
    /// Fails with `InvalidTransition` if the video is in any other status or
    /// already has a thumbnail.
    async fn mark_thumbnail_generated(
        &mut self,
        video_id: &VideoId,
        thumbnail_file_id: Uuid,
    ) -> Result<(), AppError>;

    /// Move to (or stay at) `HLS_ENCODING_COMPLETED`.
    ///
    /// Allowed from `THUMBNAIL_GENERATED` and `HLS_ENCODING_COMPLETED`. The
    /// location is only written if unset; the rendition list is replaced.
    async fn mark_hls_completed(
        &mut self,
        video_id: &VideoId,
        location: &str,
        renditions: &[Resolution],
    ) -> Result<(), AppError>;

    async fn commit(self: Box<Self>) -> Result<(), AppError>;

    async fn rollback(self: Box<Self>) -> Result<(), AppError>;
}

//! Thumbnail stage: one still frame uploaded next to the original.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;

use vidshare_core::keys::{thumbnail_key, CONTENT_TYPE_JPEG};
use vidshare_core::{NewStoredFile, UserId, VideoId};
use vidshare_storage::Storage;

use crate::error::JobError;
use crate::scratch::ScratchDir;
use crate::transcoder::Transcoder;

/// Inputs of a thumbnail run.
#[derive(Debug, Clone)]
pub struct ThumbnailRequest<'a> {
    pub video_id: &'a VideoId,
    pub owner_id: &'a UserId,
    /// Source video already written to the scratch directory.
    pub source: &'a Path,
    /// Frame position; the middle of the video when absent.
    pub timestamp_secs: Option<f64>,
    pub filename: &'a str,
}

pub struct ThumbnailStage {
    storage: Arc<dyn Storage>,
    transcoder: Arc<dyn Transcoder>,
    bucket: String,
}

impl ThumbnailStage {
    pub fn new(storage: Arc<dyn Storage>, transcoder: Arc<dyn Transcoder>, bucket: String) -> Self {
        Self {
            storage,
            transcoder,
            bucket,
        }
    }

    /// Extract, upload and describe the thumbnail.
    ///
    /// The returned record is not persisted; the caller links it to the video.
    /// If the upload fails, the thumbnail key is deleted before returning.
    #[tracing::instrument(skip(self, scratch, request), fields(video_id = %request.video_id))]
    pub async fn run(
        &self,
        scratch: &ScratchDir,
        request: ThumbnailRequest<'_>,
    ) -> Result<NewStoredFile, JobError> {
        let start = Instant::now();
        let input = request.source;

        let timestamp = match request.timestamp_secs {
            Some(ts) => ts,
            None => self.default_timestamp(input).await?,
        };

        let output = scratch.path().join(request.filename);
        self.transcoder
            .extract_frame(input, &output, timestamp)
            .await
            .map_err(|e| JobError::ThumbnailFailed(format!("{:#}", e)))?;

        let data = fs::read(&output).await?;
        let size = data.len() as i64;
        let key = thumbnail_key(request.owner_id, request.video_id, request.filename);

        let uploaded = match self
            .storage
            .upload(&self.bucket, &key, data, CONTENT_TYPE_JPEG)
            .await
        {
            Ok(uploaded) => uploaded,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Thumbnail upload failed");
                self.compensate(&key).await;
                return Err(e.into());
            }
        };

        tracing::info!(
            key = %key,
            size_bytes = size,
            timestamp_secs = timestamp,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Thumbnail uploaded"
        );

        Ok(NewStoredFile {
            owner_id: request.owner_id.clone(),
            bucket: self.bucket.clone(),
            key,
            original_name: request.filename.to_string(),
            extension: thumbnail_extension(request.filename),
            mime_type: CONTENT_TYPE_JPEG.to_string(),
            size,
            checksum: uploaded.etag,
            is_public: false,
        })
    }

    /// Best-effort removal of a thumbnail object. Failures are logged only.
    pub async fn compensate(&self, key: &str) {
        match self.storage.delete(&self.bucket, key).await {
            Ok(()) => tracing::info!(key = %key, "Compensating thumbnail delete succeeded"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Compensating thumbnail delete failed"),
        }
    }

    async fn default_timestamp(&self, input: &Path) -> Result<f64, JobError> {
        let probe = self
            .transcoder
            .probe(input)
            .await
            .map_err(|e| JobError::ProbeFailed(format!("{:#}", e)))?;
        Ok(probe.midpoint_secs())
    }
}

fn thumbnail_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("jpg")
        .to_ascii_lowercase()
}

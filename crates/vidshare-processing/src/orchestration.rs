//! Job orchestration: load → verify source → thumbnail → HLS → commit.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use vidshare_core::keys::{hls_location, original_key, DEFAULT_THUMBNAIL_FILENAME};
use vidshare_core::{
    AppError, EncodingJob, NewStoredFile, Resolution, Video, VideoId, WorkerConfig,
};
use vidshare_db::{VideoStore, VideoTransaction};
use vidshare_storage::Storage;

use crate::error::JobError;
use crate::hls::{HlsRequest, HlsStage};
use crate::scratch::{ScratchDir, ScratchSpace};
use crate::thumbnail::{ThumbnailRequest, ThumbnailStage};
use crate::transcoder::Transcoder;

/// Settings for video orchestration (bucket, scratch root, stage options).
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub private_bucket: String,
    pub scratch_dir: PathBuf,
    pub thumbnail_filename: String,
    /// Fixed thumbnail position; the middle of the video when unset.
    pub thumbnail_timestamp_secs: Option<f64>,
    pub max_concurrent_renditions: usize,
}

impl OrchestratorConfig {
    pub fn new(private_bucket: impl Into<String>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            private_bucket: private_bucket.into(),
            scratch_dir: scratch_dir.into(),
            thumbnail_filename: DEFAULT_THUMBNAIL_FILENAME.to_string(),
            thumbnail_timestamp_secs: None,
            max_concurrent_renditions: 1,
        }
    }

    pub fn from_worker_config(config: &WorkerConfig) -> Self {
        Self {
            private_bucket: config.s3_private_bucket.clone(),
            scratch_dir: config.scratch_dir.clone(),
            thumbnail_filename: config.thumbnail_filename.clone(),
            thumbnail_timestamp_secs: None,
            max_concurrent_renditions: config.max_concurrent_renditions,
        }
    }
}

/// What a successful job did.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub video_id: VideoId,
    pub thumbnail_generated: bool,
    pub renditions: Vec<Resolution>,
    pub hls_location: String,
    /// Every HLS object written, master playlist last.
    pub uploaded_keys: Vec<String>,
}

/// Anything that can process a validated encoding job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &EncodingJob) -> Result<JobOutcome, JobError>;
}

/// Runs one encoding job against the record store, object storage and transcoder.
pub struct VideoOrchestrator {
    store: Arc<dyn VideoStore>,
    scratch: ScratchSpace,
    thumbnails: ThumbnailStage,
    hls: HlsStage,
    storage: Arc<dyn Storage>,
    config: OrchestratorConfig,
}

impl VideoOrchestrator {
    pub fn new(
        store: Arc<dyn VideoStore>,
        storage: Arc<dyn Storage>,
        transcoder: Arc<dyn Transcoder>,
        config: OrchestratorConfig,
    ) -> Self {
        let thumbnails = ThumbnailStage::new(
            storage.clone(),
            transcoder.clone(),
            config.private_bucket.clone(),
        );
        let hls = HlsStage::new(
            storage.clone(),
            transcoder,
            config.private_bucket.clone(),
            config.max_concurrent_renditions,
        );
        Self {
            store,
            scratch: ScratchSpace::new(config.scratch_dir.clone()),
            thumbnails,
            hls,
            storage,
            config,
        }
    }

    /// Run the whole job. The scratch directory is gone when this returns.
    #[tracing::instrument(skip(self, job), fields(video_id = %job.video_id))]
    pub async fn process(&self, job: &EncodingJob) -> Result<JobOutcome, JobError> {
        let start = Instant::now();
        tracing::info!(video_id = %job.video_id, "Starting video processing");

        let video = self
            .store
            .find_video(&job.video_id)
            .await?
            .ok_or_else(|| JobError::VideoNotFound(job.video_id.clone()))?;

        self.ensure_source_exists(&video).await?;

        let scratch = self.scratch.create(&video.id).await?;
        let result = self.run_stages(&video, &scratch).await;

        if let Err(e) = scratch.cleanup().await {
            tracing::warn!(
                video_id = %video.id,
                error = %e,
                "Failed to remove scratch directory"
            );
        }

        match &result {
            Ok(outcome) => tracing::info!(
                video_id = %video.id,
                thumbnail_generated = outcome.thumbnail_generated,
                rendition_count = outcome.renditions.len(),
                file_count = outcome.uploaded_keys.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Video processing completed successfully"
            ),
            Err(e) => tracing::error!(
                video_id = %video.id,
                error = %e,
                kind = %e.kind(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Video processing failed"
            ),
        }

        result
    }

    async fn ensure_source_exists(&self, video: &Video) -> Result<(), JobError> {
        let bucket = &self.config.private_bucket;
        let key = original_key(&video.owner_id, &video.id, video.original_extension());

        if !self.storage.exists(bucket, &key).await? {
            return Err(JobError::SourceMissing {
                bucket: bucket.clone(),
                key,
            });
        }
        Ok(())
    }

    /// Steps inside the transaction. Any failure rolls it back.
    async fn run_stages(&self, video: &Video, scratch: &ScratchDir) -> Result<JobOutcome, JobError> {
        let mut tx = self.store.begin().await?;

        match self.run_in_transaction(video, scratch, &mut *tx).await {
            Ok(outcome) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(
                        video_id = %video.id,
                        error = %rollback_err,
                        "Failed to roll back transaction"
                    );
                }
                Err(e)
            }
        }
    }

    async fn run_in_transaction(
        &self,
        video: &Video,
        scratch: &ScratchDir,
        tx: &mut dyn VideoTransaction,
    ) -> Result<JobOutcome, JobError> {
        let bucket = &self.config.private_bucket;
        let extension = video.original_extension();
        let source_key = original_key(&video.owner_id, &video.id, extension);

        let download_start = Instant::now();
        let source = self.storage.download(bucket, &source_key).await?;
        tracing::info!(
            video_id = %video.id,
            key = %source_key,
            size_bytes = source.len(),
            duration_ms = download_start.elapsed().as_secs_f64() * 1000.0,
            "Original downloaded"
        );
        let source_path = scratch.materialize_source(&source, extension).await?;
        drop(source);

        let thumbnail_generated = if video.status.needs_thumbnail() {
            self.generate_thumbnail(video, scratch, &source_path, tx).await?;
            true
        } else {
            tracing::info!(
                video_id = %video.id,
                status = %video.status,
                "Thumbnail already generated, skipping"
            );
            false
        };

        let output = self
            .hls
            .run(
                scratch,
                HlsRequest {
                    video_id: &video.id,
                    owner_id: &video.owner_id,
                    source: &source_path,
                },
            )
            .await?;

        let location = hls_location(bucket, &video.owner_id, &video.id);
        tx.mark_hls_completed(&video.id, &location, &output.renditions)
            .await?;

        Ok(JobOutcome {
            video_id: video.id.clone(),
            thumbnail_generated,
            renditions: output.renditions,
            hls_location: location,
            uploaded_keys: output.uploaded_keys,
        })
    }

    /// Thumbnail stage plus its rows. A failed row write removes the uploaded object.
    async fn generate_thumbnail(
        &self,
        video: &Video,
        scratch: &ScratchDir,
        source: &Path,
        tx: &mut dyn VideoTransaction,
    ) -> Result<(), JobError> {
        let new_file = self
            .thumbnails
            .run(
                scratch,
                ThumbnailRequest {
                    video_id: &video.id,
                    owner_id: &video.owner_id,
                    source,
                    timestamp_secs: self.config.thumbnail_timestamp_secs,
                    filename: &self.config.thumbnail_filename,
                },
            )
            .await?;

        let key = new_file.key.clone();
        if let Err(e) = record_thumbnail(tx, &video.id, new_file).await {
            tracing::error!(video_id = %video.id, key = %key, error = %e, "Failed to record thumbnail");
            self.thumbnails.compensate(&key).await;
            return Err(e.into());
        }
        Ok(())
    }
}

async fn record_thumbnail(
    tx: &mut dyn VideoTransaction,
    video_id: &VideoId,
    file: NewStoredFile,
) -> Result<(), AppError> {
    let stored = tx.insert_stored_file(file).await?;
    tx.mark_thumbnail_generated(video_id, stored.id).await
}

#[async_trait]
impl JobHandler for VideoOrchestrator {
    async fn handle(&self, job: &EncodingJob) -> Result<JobOutcome, JobError> {
        self.process(job).await
    }
}

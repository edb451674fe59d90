//! HLS encoding stage: ladder renditions, master playlist and upload.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tokio::sync::Semaphore;

use vidshare_core::keys::{content_type_for, video_prefix, MASTER_PLAYLIST, RENDITION_PLAYLIST};
use vidshare_core::{select_renditions, Resolution, UserId, VideoId, SEGMENT_DURATION_SECS};
use vidshare_storage::Storage;

use crate::error::JobError;
use crate::scratch::ScratchDir;
use crate::transcoder::{ProbeResult, Transcoder};

/// Inputs of an encoding run.
#[derive(Debug, Clone)]
pub struct HlsRequest<'a> {
    pub video_id: &'a VideoId,
    pub owner_id: &'a UserId,
    /// Source video already written to the scratch directory.
    pub source: &'a Path,
}

/// Result of a successful encoding run.
#[derive(Debug, Clone)]
pub struct HlsOutput {
    /// Renditions produced, ascending.
    pub renditions: Vec<Resolution>,
    /// Every uploaded key, in upload order. The master playlist is last.
    pub uploaded_keys: Vec<String>,
}

pub struct HlsStage {
    storage: Arc<dyn Storage>,
    transcoder: Arc<dyn Transcoder>,
    bucket: String,
    max_concurrent_renditions: usize,
}

impl HlsStage {
    pub fn new(
        storage: Arc<dyn Storage>,
        transcoder: Arc<dyn Transcoder>,
        bucket: String,
        max_concurrent_renditions: usize,
    ) -> Self {
        Self {
            storage,
            transcoder,
            bucket,
            max_concurrent_renditions: max_concurrent_renditions.max(1),
        }
    }

    #[tracing::instrument(skip(self, scratch, request), fields(video_id = %request.video_id))]
    pub async fn run(
        &self,
        scratch: &ScratchDir,
        request: HlsRequest<'_>,
    ) -> Result<HlsOutput, JobError> {
        let start = Instant::now();
        let input = request.source;

        let probe = self
            .transcoder
            .probe(input)
            .await
            .map_err(|e| JobError::ProbeFailed(format!("{:#}", e)))?;

        let renditions = select_renditions(probe.height);
        if renditions.is_empty() {
            tracing::warn!(
                source_height = probe.height,
                "Source is below the lowest rendition, producing an empty ladder"
            );
        }

        let output_dir = scratch.hls_dir();
        fs::create_dir_all(&output_dir).await?;

        self.encode_all(input, &output_dir, &renditions).await?;

        let master = master_playlist(&renditions, &probe);
        fs::write(output_dir.join(MASTER_PLAYLIST), master).await?;

        let prefix = video_prefix(request.owner_id, request.video_id);
        let uploaded_keys = self.upload_tree(&output_dir, &prefix).await?;

        tracing::info!(
            rendition_count = renditions.len(),
            file_count = uploaded_keys.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "HLS encoding completed"
        );

        Ok(HlsOutput {
            renditions,
            uploaded_keys,
        })
    }

    /// Encode every rendition, at most `max_concurrent_renditions` at a time.
    ///
    /// After the first failure no further rendition is started; running ones
    /// finish. The reported error is the first failing rendition in ladder order.
    async fn encode_all(
        &self,
        input: &Path,
        output_dir: &Path,
        renditions: &[Resolution],
    ) -> Result<(), JobError> {
        let semaphore = Semaphore::new(self.max_concurrent_renditions);
        let failed = AtomicBool::new(false);

        let tasks = renditions.iter().map(|&resolution| {
            self.encode_one(input, output_dir, resolution, &semaphore, &failed)
        });

        futures::future::join_all(tasks)
            .await
            .into_iter()
            .collect::<Result<Vec<()>, JobError>>()?;
        Ok(())
    }

    async fn encode_one(
        &self,
        input: &Path,
        output_dir: &Path,
        resolution: Resolution,
        semaphore: &Semaphore,
        failed: &AtomicBool,
    ) -> Result<(), JobError> {
        let _permit = semaphore
            .acquire()
            .await
            .map_err(|e| JobError::TranscodeFailed {
                resolution,
                message: e.to_string(),
            })?;
        if failed.load(Ordering::SeqCst) {
            return Ok(());
        }

        let dir = output_dir.join(resolution.label());
        fs::create_dir_all(&dir).await?;

        if let Err(e) = self
            .transcoder
            .encode_rendition(input, &dir, resolution, SEGMENT_DURATION_SECS)
            .await
        {
            failed.store(true, Ordering::SeqCst);
            tracing::error!(resolution = %resolution, error = %e, "Rendition failed");
            return Err(JobError::TranscodeFailed {
                resolution,
                message: format!("{:#}", e),
            });
        }
        Ok(())
    }

    /// Upload every file below `root` under `{prefix}/{relative path}`.
    /// The master playlist goes last so it never references missing objects.
    async fn upload_tree(&self, root: &Path, prefix: &str) -> Result<Vec<String>, JobError> {
        let mut files = collect_files(root).await?;
        files.sort_by_key(|rel| (rel == MASTER_PLAYLIST, rel.clone()));

        let mut keys = Vec::with_capacity(files.len());
        for rel in files {
            let data = fs::read(root.join(&rel)).await?;
            let key = format!("{}/{}", prefix, rel);
            self.storage
                .upload(&self.bucket, &key, data, content_type_for(&rel))
                .await?;
            keys.push(key);
        }
        Ok(keys)
    }
}

/// Relative `/`-separated paths of every regular file below `root`.
async fn collect_files(root: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                if let Ok(rel) = path.strip_prefix(root) {
                    let parts: Vec<String> = rel
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    files.push(parts.join("/"));
                }
            }
        }
    }
    Ok(files)
}

/// Build the master playlist for the produced renditions.
pub fn master_playlist(renditions: &[Resolution], probe: &ProbeResult) -> String {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n");

    for resolution in renditions {
        match resolution.scaled_width(probe.width, probe.height) {
            Some(width) => playlist.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={},RESOLUTION={}x{}\n",
                resolution.bandwidth(),
                width,
                resolution.height()
            )),
            None => playlist.push_str(&format!(
                "#EXT-X-STREAM-INF:BANDWIDTH={}\n",
                resolution.bandwidth()
            )),
        }
        playlist.push_str(&format!("{}/{}\n", resolution.label(), RENDITION_PLAYLIST));
    }

    playlist
}

//! Fake transcoder and fault-injecting storage wrapper

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use vidshare_core::keys::{segment_pattern, RENDITION_PLAYLIST};
use vidshare_core::Resolution;
use vidshare_storage::{Storage, StorageBackend, StorageError, StorageResult, UploadedObject};

use crate::transcoder::{ProbeResult, Transcoder};

/// One recorded transcoder invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum TranscoderCall {
    Probe,
    ExtractFrame { timestamp_secs: f64 },
    Encode(Resolution),
}

/// Transcoder that writes placeholder files instead of running ffmpeg.
///
/// Every rendition gets an `index.m3u8` and two segments.
#[derive(Clone)]
pub struct FakeTranscoder {
    probe: ProbeResult,
    fail_probe: bool,
    fail_frame: bool,
    fail_at: Option<Resolution>,
    encode_delay: Duration,
    calls: Arc<Mutex<Vec<TranscoderCall>>>,
    active_encodes: Arc<AtomicUsize>,
    max_active_encodes: Arc<AtomicUsize>,
}

impl FakeTranscoder {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            probe: ProbeResult {
                width,
                height,
                duration_secs: 12.0,
            },
            fail_probe: false,
            fail_frame: false,
            fail_at: None,
            encode_delay: Duration::from_millis(0),
            calls: Arc::new(Mutex::new(Vec::new())),
            active_encodes: Arc::new(AtomicUsize::new(0)),
            max_active_encodes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_duration(mut self, duration_secs: f64) -> Self {
        self.probe.duration_secs = duration_secs;
        self
    }

    pub fn failing_probe(mut self) -> Self {
        self.fail_probe = true;
        self
    }

    pub fn failing_frame(mut self) -> Self {
        self.fail_frame = true;
        self
    }

    /// Fail the encode of one rendition.
    pub fn failing_at(mut self, resolution: Resolution) -> Self {
        self.fail_at = Some(resolution);
        self
    }

    /// Keep each encode running for a while so overlap can be observed.
    pub fn with_encode_delay(mut self, delay: Duration) -> Self {
        self.encode_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<TranscoderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Renditions passed to `encode_rendition`, in call order.
    pub fn encoded(&self) -> Vec<Resolution> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                TranscoderCall::Encode(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    /// Highest number of encodes that ran at the same time.
    pub fn max_concurrent_encodes(&self) -> usize {
        self.max_active_encodes.load(Ordering::SeqCst)
    }

    fn record(&self, call: TranscoderCall) {
        self.calls.lock().unwrap().push(call);
    }
}

fn require_input(input: &Path) -> Result<()> {
    if !input.is_file() {
        return Err(anyhow!("input {} does not exist", input.display()));
    }
    Ok(())
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn probe(&self, input: &Path) -> Result<ProbeResult> {
        self.record(TranscoderCall::Probe);
        require_input(input)?;
        if self.fail_probe {
            return Err(anyhow!("No video stream found"));
        }
        Ok(self.probe)
    }

    async fn extract_frame(&self, input: &Path, output: &Path, timestamp_secs: f64) -> Result<()> {
        self.record(TranscoderCall::ExtractFrame { timestamp_secs });
        require_input(input)?;
        if self.fail_frame {
            return Err(anyhow!("frame extraction failed"));
        }
        tokio::fs::write(output, b"\xFF\xD8\xFFfake-jpeg").await?;
        Ok(())
    }

    async fn encode_rendition(
        &self,
        input: &Path,
        output_dir: &Path,
        resolution: Resolution,
        segment_duration: u32,
    ) -> Result<()> {
        self.record(TranscoderCall::Encode(resolution));
        require_input(input)?;

        let active = self.active_encodes.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_encodes.fetch_max(active, Ordering::SeqCst);
        if !self.encode_delay.is_zero() {
            tokio::time::sleep(self.encode_delay).await;
        }
        self.active_encodes.fetch_sub(1, Ordering::SeqCst);

        if self.fail_at == Some(resolution) {
            return Err(anyhow!("encoder exited with status 1"));
        }

        tokio::fs::create_dir_all(output_dir).await?;
        let pattern = segment_pattern(resolution);
        let mut playlist = format!(
            "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:{}\n#EXT-X-PLAYLIST-TYPE:VOD\n",
            segment_duration
        );
        for n in 0..2 {
            let segment = pattern.replace("%03d", &format!("{:03}", n));
            tokio::fs::write(output_dir.join(&segment), b"fake-ts").await?;
            playlist.push_str(&format!("#EXTINF:{}.0,\n{}\n", segment_duration, segment));
        }
        playlist.push_str("#EXT-X-ENDLIST\n");
        tokio::fs::write(output_dir.join(RENDITION_PLAYLIST), playlist).await?;
        Ok(())
    }
}

#[derive(Default)]
struct Faults {
    upload_suffix: Option<String>,
    write_before_failing: bool,
    fail_downloads: bool,
    fail_deletes: bool,
}

/// Storage wrapper that counts calls and injects failures.
#[derive(Clone)]
pub struct FaultyStorage {
    inner: Arc<dyn Storage>,
    faults: Arc<Mutex<Faults>>,
    uploads: Arc<AtomicUsize>,
    downloads: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
    exists_checks: Arc<AtomicUsize>,
}

impl FaultyStorage {
    pub fn new(inner: Arc<dyn Storage>) -> Self {
        Self {
            inner,
            faults: Arc::new(Mutex::new(Faults::default())),
            uploads: Arc::new(AtomicUsize::new(0)),
            downloads: Arc::new(AtomicUsize::new(0)),
            deletes: Arc::new(AtomicUsize::new(0)),
            exists_checks: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail uploads whose key ends with `suffix`. With `write_before_failing`
    /// the object is stored before the error is returned, like a partial write.
    pub fn fail_uploads_ending_with(&self, suffix: &str, write_before_failing: bool) {
        let mut faults = self.faults.lock().unwrap();
        faults.upload_suffix = Some(suffix.to_string());
        faults.write_before_failing = write_before_failing;
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.faults.lock().unwrap().fail_downloads = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.faults.lock().unwrap().fail_deletes = fail;
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    pub fn exists_count(&self) -> usize {
        self.exists_checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<UploadedObject> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        let (fail, write_first) = {
            let faults = self.faults.lock().unwrap();
            let fail = faults
                .upload_suffix
                .as_deref()
                .map(|suffix| key.ends_with(suffix))
                .unwrap_or(false);
            (fail, faults.write_before_failing)
        };

        if fail {
            if write_first {
                self.inner.upload(bucket, key, data, content_type).await?;
            }
            return Err(StorageError::UploadFailed(format!(
                "injected failure for {}",
                key
            )));
        }
        self.inner.upload(bucket, key, data, content_type).await
    }

    async fn download(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.faults.lock().unwrap().fail_downloads {
            return Err(StorageError::DownloadFailed("injected failure".to_string()));
        }
        self.inner.download(bucket, key).await
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        self.exists_checks.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(bucket, key).await
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.faults.lock().unwrap().fail_deletes {
            return Err(StorageError::DeleteFailed("injected failure".to_string()));
        }
        self.inner.delete(bucket, key).await
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}

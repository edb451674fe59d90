//! Test helpers: an orchestrator wired to the in-memory record store, local
//! storage in a temp directory and the fake transcoder.
//!
//! Run from workspace root: `cargo test -p vidshare-processing`.

use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use vidshare_core::keys::original_key;
use vidshare_core::{EncodingJob, EncodingJobMessage, UserId, Video, VideoId, VideoStatus};
use vidshare_db::MemoryVideoStore;
use vidshare_processing::test_helpers::{FakeTranscoder, FaultyStorage};
use vidshare_processing::{OrchestratorConfig, VideoOrchestrator};
use vidshare_storage::{LocalStorage, Storage};

pub const BUCKET: &str = "private";

/// Bytes stored as the original upload.
pub const SOURCE_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42fake-video";

pub struct TestPipeline {
    pub store: MemoryVideoStore,
    pub storage: FaultyStorage,
    pub transcoder: FakeTranscoder,
    pub orchestrator: VideoOrchestrator,
    pub scratch_root: PathBuf,
    config: OrchestratorConfig,
    _storage_dir: TempDir,
    _scratch_dir: TempDir,
}

impl TestPipeline {
    /// Orchestrator over the same store and storage with another transcoder.
    pub fn with_transcoder(&self, transcoder: FakeTranscoder) -> VideoOrchestrator {
        VideoOrchestrator::new(
            Arc::new(self.store.clone()),
            Arc::new(self.storage.clone()),
            Arc::new(transcoder),
            self.config.clone(),
        )
    }

    /// Seed a video record and upload its original.
    pub async fn seed_video(&self, video_id: &str, owner_id: &str) -> Video {
        let video = self.seed_record(video_id, owner_id);
        let key = original_key(&video.owner_id, &video.id, "mp4");
        self.storage
            .upload(BUCKET, &key, SOURCE_BYTES.to_vec(), "video/mp4")
            .await
            .expect("Failed to upload original");
        video
    }

    /// Seed only the record; the original object is absent.
    pub fn seed_record(&self, video_id: &str, owner_id: &str) -> Video {
        self.store.seed_upload(video_id, owner_id, BUCKET, "mp4")
    }

    /// Move a seeded video to `status` without touching its relations.
    pub fn set_status(&self, video_id: &str, status: VideoStatus) {
        let mut video = self.store.video(video_id).expect("video not seeded");
        video.status = status;
        self.store.insert_video(video);
    }

    pub async fn object_exists(&self, key: &str) -> bool {
        self.storage
            .exists(BUCKET, key)
            .await
            .expect("exists check failed")
    }

    pub async fn object(&self, key: &str) -> Vec<u8> {
        self.storage
            .download(BUCKET, key)
            .await
            .expect("Failed to download object")
    }

    pub fn scratch_dir_of(&self, video_id: &str) -> PathBuf {
        self.scratch_root.join(video_id)
    }

    /// Entries left under the scratch root.
    pub fn scratch_entries(&self) -> usize {
        std::fs::read_dir(&self.scratch_root)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

pub async fn setup_pipeline(transcoder: FakeTranscoder) -> TestPipeline {
    setup_pipeline_with(transcoder, |_| {}).await
}

pub async fn setup_pipeline_with(
    transcoder: FakeTranscoder,
    configure: impl FnOnce(&mut OrchestratorConfig),
) -> TestPipeline {
    let storage_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let scratch_dir = tempfile::tempdir().expect("Failed to create temp directory");

    let local: Arc<dyn Storage> = Arc::new(
        LocalStorage::new(storage_dir.path())
            .await
            .expect("Failed to create local storage"),
    );
    let storage = FaultyStorage::new(local);
    let store = MemoryVideoStore::new();

    let scratch_root = scratch_dir.path().to_path_buf();
    let mut config = OrchestratorConfig::new(BUCKET, scratch_root.clone());
    configure(&mut config);

    let orchestrator = VideoOrchestrator::new(
        Arc::new(store.clone()),
        Arc::new(storage.clone()),
        Arc::new(transcoder.clone()),
        config.clone(),
    );

    TestPipeline {
        store,
        storage,
        transcoder,
        orchestrator,
        scratch_root,
        config,
        _storage_dir: storage_dir,
        _scratch_dir: scratch_dir,
    }
}

/// Job decoded from the wire format, as the consumer would see it.
pub fn job(video_id: &str) -> EncodingJob {
    let id = VideoId::parse(video_id).expect("valid video id");
    let bytes = EncodingJobMessage::new(&id)
        .to_bytes()
        .expect("Failed to encode message");
    EncodingJobMessage::parse(&bytes).expect("Failed to decode message")
}

pub fn user(id: &str) -> UserId {
    UserId::parse(id).expect("valid user id")
}

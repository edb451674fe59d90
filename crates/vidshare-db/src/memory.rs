//! In-memory record store for testing without a database
//!
//! Writes made through a [`MemoryVideoTransaction`] are staged and only applied
//! to the shared state on commit, so tests observe the same atomicity as with
//! Postgres.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use vidshare_core::{
    AppError, NewStoredFile, Resolution, StoredFile, UserId, Video, VideoId, VideoStatus,
};

use crate::store::{VideoStore, VideoTransaction};

#[derive(Default)]
struct State {
    videos: HashMap<VideoId, Video>,
    files: HashMap<Uuid, StoredFile>,
}

#[derive(Default)]
struct Counters {
    begun: AtomicUsize,
    committed: AtomicUsize,
    rolled_back: AtomicUsize,
}

/// Mock video store backed by hash maps
#[derive(Clone, Default)]
pub struct MemoryVideoStore {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
    fail_stored_file_inserts: Arc<AtomicBool>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a video at `ORIGINAL_UPLOADED` with its origin file.
    pub fn insert_video(&self, video: Video) {
        let mut state = self.state.lock().unwrap();
        state
            .files
            .insert(video.origin_metadata.id, video.origin_metadata.clone());
        if let Some(ref thumb) = video.thumbnail_metadata {
            state.files.insert(thumb.id, thumb.clone());
        }
        state.videos.insert(video.id.clone(), video);
    }

    /// Build and seed a fresh upload of `{owner}/{video}/video.{extension}` in `bucket`.
    pub fn seed_upload(&self, video_id: &str, owner_id: &str, bucket: &str, extension: &str) -> Video {
        let now = Utc::now();
        let owner = UserId::parse(owner_id).unwrap();
        let id = VideoId::parse(video_id).unwrap();
        let origin = StoredFile {
            id: Uuid::new_v4(),
            owner_id: owner.clone(),
            bucket: bucket.to_string(),
            key: vidshare_core::keys::original_key(&owner, &id, extension),
            original_name: format!("upload.{}", extension),
            extension: extension.to_string(),
            mime_type: "video/mp4".to_string(),
            size: 0,
            checksum: String::new(),
            is_public: false,
            is_deleted: false,
            created_at: now,
            updated_at: now,
        };
        let video = Video {
            id,
            status: VideoStatus::OriginalUploaded,
            owner_id: owner,
            origin_metadata: origin,
            thumbnail_metadata: None,
            video_hls_file_location: None,
            hls_renditions: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.insert_video(video.clone());
        video
    }

    /// Committed state of a video.
    pub fn video(&self, id: &str) -> Option<Video> {
        let id = VideoId::parse(id).ok()?;
        self.state.lock().unwrap().videos.get(&id).cloned()
    }

    /// Committed stored files, excluding the origin files of seeded videos.
    pub fn stored_files(&self) -> Vec<StoredFile> {
        let state = self.state.lock().unwrap();
        let origins: Vec<Uuid> = state
            .videos
            .values()
            .map(|v| v.origin_metadata.id)
            .collect();
        state
            .files
            .values()
            .filter(|f| !origins.contains(&f.id))
            .cloned()
            .collect()
    }

    /// Make every subsequent `insert_stored_file` fail.
    pub fn fail_stored_file_inserts(&self, fail: bool) {
        self.fail_stored_file_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn begin_count(&self) -> usize {
        self.counters.begun.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.counters.committed.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.counters.rolled_back.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn find_video(&self, id: &VideoId) -> Result<Option<Video>, AppError> {
        Ok(self.state.lock().unwrap().videos.get(id).cloned())
    }

    async fn begin(&self) -> Result<Box<dyn VideoTransaction>, AppError> {
        self.counters.begun.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryVideoTransaction {
            store: self.clone(),
            files: Vec::new(),
            videos: HashMap::new(),
        }))
    }
}

/// Staged writes of one unit of work
pub struct MemoryVideoTransaction {
    store: MemoryVideoStore,
    files: Vec<StoredFile>,
    videos: HashMap<VideoId, Video>,
}

impl MemoryVideoTransaction {
    /// Current view of a video inside this transaction.
    fn staged_video(&mut self, id: &VideoId) -> Result<&mut Video, AppError> {
        if !self.videos.contains_key(id) {
            let committed = self
                .store
                .state
                .lock()
                .unwrap()
                .videos
                .get(id)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("video {}", id)))?;
            self.videos.insert(id.clone(), committed);
        }
        self.videos
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("video {}", id)))
    }

    fn staged_file(&self, id: Uuid) -> Option<StoredFile> {
        self.files
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .or_else(|| self.store.state.lock().unwrap().files.get(&id).cloned())
    }
}

#[async_trait]
impl VideoTransaction for MemoryVideoTransaction {
    async fn insert_stored_file(&mut self, file: NewStoredFile) -> Result<StoredFile, AppError> {
        if self.store.fail_stored_file_inserts.load(Ordering::SeqCst) {
            return Err(AppError::Internal(
                "simulated stored_files insert failure".to_string(),
            ));
        }
        let stored = file.into_stored(Utc::now());
        self.files.push(stored.clone());
        Ok(stored)
    }

    async fn mark_thumbnail_generated(
        &mut self,
        video_id: &VideoId,
        thumbnail_file_id: Uuid,
    ) -> Result<(), AppError> {
        let thumbnail = self
            .staged_file(thumbnail_file_id)
            .ok_or_else(|| AppError::NotFound(format!("stored file {}", thumbnail_file_id)))?;

        let video = self.staged_video(video_id)?;
        if video.status != VideoStatus::OriginalUploaded || video.thumbnail_metadata.is_some() {
            return Err(AppError::InvalidTransition {
                from: video.status,
                to: VideoStatus::ThumbnailGenerated,
            });
        }

        video.status = VideoStatus::ThumbnailGenerated;
        video.thumbnail_metadata = Some(thumbnail);
        video.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_hls_completed(
        &mut self,
        video_id: &VideoId,
        location: &str,
        renditions: &[Resolution],
    ) -> Result<(), AppError> {
        let video = self.staged_video(video_id)?;
        if !video.status.can_advance_to(VideoStatus::HlsEncodingCompleted) {
            return Err(AppError::InvalidTransition {
                from: video.status,
                to: VideoStatus::HlsEncodingCompleted,
            });
        }

        video.status = VideoStatus::HlsEncodingCompleted;
        if video.video_hls_file_location.is_none() {
            video.video_hls_file_location = Some(location.to_string());
        }
        video.hls_renditions = renditions.to_vec();
        video.updated_at = Utc::now();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        let MemoryVideoTransaction {
            store,
            files,
            videos,
        } = *self;
        {
            let mut state = store.state.lock().unwrap();
            for file in files {
                state.files.insert(file.id, file);
            }
            for (id, video) in videos {
                state.videos.insert(id, video);
            }
        }
        store.counters.committed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.store.counters.rolled_back.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thumbnail_file(owner: &str) -> NewStoredFile {
        NewStoredFile {
            owner_id: UserId::parse(owner).unwrap(),
            bucket: "private".to_string(),
            key: format!("{}/v1/thumbnail.jpg", owner),
            original_name: "thumbnail.jpg".to_string(),
            extension: "jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
            size: 3,
            checksum: "abc".to_string(),
            is_public: false,
        }
    }

    #[tokio::test]
    async fn writes_are_invisible_until_commit() {
        let store = MemoryVideoStore::new();
        let video = store.seed_upload("v1", "u1", "private", "mp4");

        let mut tx = store.begin().await.unwrap();
        let thumb = tx.insert_stored_file(thumbnail_file("u1")).await.unwrap();
        tx.mark_thumbnail_generated(&video.id, thumb.id).await.unwrap();

        assert_eq!(store.video("v1").unwrap().status, VideoStatus::OriginalUploaded);
        assert!(store.stored_files().is_empty());

        tx.commit().await.unwrap();

        let committed = store.video("v1").unwrap();
        assert_eq!(committed.status, VideoStatus::ThumbnailGenerated);
        assert_eq!(committed.thumbnail_metadata.unwrap().id, thumb.id);
        assert_eq!(store.stored_files().len(), 1);
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn rollback_discards_staged_writes() {
        let store = MemoryVideoStore::new();
        let video = store.seed_upload("v1", "u1", "private", "mp4");

        let mut tx = store.begin().await.unwrap();
        let thumb = tx.insert_stored_file(thumbnail_file("u1")).await.unwrap();
        tx.mark_thumbnail_generated(&video.id, thumb.id).await.unwrap();
        tx.rollback().await.unwrap();

        assert_eq!(store.video("v1").unwrap().status, VideoStatus::OriginalUploaded);
        assert!(store.stored_files().is_empty());
        assert_eq!(store.rollback_count(), 1);
    }

    #[tokio::test]
    async fn status_moves_through_both_stages_in_one_transaction() {
        let store = MemoryVideoStore::new();
        let video = store.seed_upload("v1", "u1", "private", "mp4");

        let mut tx = store.begin().await.unwrap();
        let thumb = tx.insert_stored_file(thumbnail_file("u1")).await.unwrap();
        tx.mark_thumbnail_generated(&video.id, thumb.id).await.unwrap();
        tx.mark_hls_completed(&video.id, "private/u1/v1/master.m3u8", &[Resolution::P360])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let committed = store.video("v1").unwrap();
        assert_eq!(committed.status, VideoStatus::HlsEncodingCompleted);
        assert_eq!(
            committed.video_hls_file_location.as_deref(),
            Some("private/u1/v1/master.m3u8")
        );
        assert_eq!(committed.hls_renditions, vec![Resolution::P360]);
    }

    #[tokio::test]
    async fn guarded_transitions_reject_out_of_order_updates() {
        let store = MemoryVideoStore::new();
        let video = store.seed_upload("v1", "u1", "private", "mp4");

        let mut tx = store.begin().await.unwrap();
        let err = tx
            .mark_hls_completed(&video.id, "private/u1/v1/master.m3u8", &[])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: VideoStatus::OriginalUploaded,
                to: VideoStatus::HlsEncodingCompleted
            }
        ));

        let thumb = tx.insert_stored_file(thumbnail_file("u1")).await.unwrap();
        tx.mark_thumbnail_generated(&video.id, thumb.id).await.unwrap();
        let err = tx
            .mark_thumbnail_generated(&video.id, thumb.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn completed_video_keeps_first_location() {
        let store = MemoryVideoStore::new();
        let mut video = store.seed_upload("v1", "u1", "private", "mp4");
        video.status = VideoStatus::HlsEncodingCompleted;
        video.video_hls_file_location = Some("private/u1/v1/master.m3u8".to_string());
        store.insert_video(video.clone());

        let mut tx = store.begin().await.unwrap();
        tx.mark_hls_completed(&video.id, "elsewhere/master.m3u8", &[Resolution::P720])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let committed = store.video("v1").unwrap();
        assert_eq!(committed.status, VideoStatus::HlsEncodingCompleted);
        assert_eq!(
            committed.video_hls_file_location.as_deref(),
            Some("private/u1/v1/master.m3u8")
        );
        assert_eq!(committed.hls_renditions, vec![Resolution::P720]);
    }

    #[tokio::test]
    async fn unknown_video_is_not_found() {
        let store = MemoryVideoStore::new();
        let id = VideoId::parse("missing").unwrap();
        assert!(store.find_video(&id).await.unwrap().is_none());

        let mut tx = store.begin().await.unwrap();
        let err = tx.mark_hls_completed(&id, "x", &[]).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn insert_failures_can_be_simulated() {
        let store = MemoryVideoStore::new();
        store.fail_stored_file_inserts(true);
        let mut tx = store.begin().await.unwrap();
        assert!(tx.insert_stored_file(thumbnail_file("u1")).await.is_err());
    }
}

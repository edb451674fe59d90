//! Per-job scratch directories on local disk.
//!
//! Every job works inside `{base}/{videoId}`. The directory is owned by the job
//! for its whole run and removed when the job returns, whatever the outcome.

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use vidshare_core::VideoId;

/// Root under which job directories are created.
#[derive(Debug, Clone)]
pub struct ScratchSpace {
    base: PathBuf,
}

impl ScratchSpace {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// `{base}/{videoId}`
    pub fn job_dir(&self, video_id: &VideoId) -> PathBuf {
        self.base.join(video_id.as_str())
    }

    /// Create a fresh directory for the job.
    ///
    /// Leftovers from a crashed attempt on the same video are removed first.
    pub async fn create(&self, video_id: &VideoId) -> io::Result<ScratchDir> {
        let path = self.job_dir(video_id);

        match fs::remove_dir_all(&path).await {
            Ok(()) => {
                tracing::warn!(path = %path.display(), "Removed stale scratch directory");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        fs::create_dir_all(&path).await?;
        tracing::debug!(path = %path.display(), "Scratch directory created");

        Ok(ScratchDir {
            path,
            cleaned: false,
        })
    }
}

/// Scoped handle on a job directory.
///
/// Call [`ScratchDir::cleanup`] to remove it and observe failures; dropping the
/// handle without doing so removes it synchronously.
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    cleaned: bool,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `{dir}/video.{extension}`
    pub fn source_path(&self, extension: &str) -> PathBuf {
        self.path
            .join(format!("video.{}", extension.trim_start_matches('.')))
    }

    /// Root of the HLS output tree.
    pub fn hls_dir(&self) -> PathBuf {
        self.path.join("hls")
    }

    /// Write the source bytes to `video.{extension}` and return its path.
    pub async fn materialize_source(&self, data: &[u8], extension: &str) -> io::Result<PathBuf> {
        let path = self.source_path(extension);
        fs::write(&path, data).await?;
        tracing::debug!(
            path = %path.display(),
            size_bytes = data.len(),
            "Source materialized"
        );
        Ok(path)
    }

    /// Remove the directory tree. A directory that is already gone is fine.
    pub async fn cleanup(mut self) -> io::Result<()> {
        self.cleaned = true;
        match fs::remove_dir_all(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        if let Err(e) = std::fs::remove_dir_all(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove scratch directory on drop"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_id() -> VideoId {
        VideoId::parse("v1").unwrap()
    }

    #[tokio::test]
    async fn create_and_cleanup() {
        let base = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(base.path());

        let dir = space.create(&video_id()).await.unwrap();
        assert_eq!(dir.path(), base.path().join("v1"));
        assert!(dir.path().is_dir());

        let source = dir.materialize_source(b"bytes", ".mp4").await.unwrap();
        assert_eq!(source, base.path().join("v1").join("video.mp4"));
        assert_eq!(std::fs::read(&source).unwrap(), b"bytes");

        dir.cleanup().await.unwrap();
        assert!(!base.path().join("v1").exists());
    }

    #[tokio::test]
    async fn materialize_overwrites_existing_file() {
        let base = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(base.path());
        let dir = space.create(&video_id()).await.unwrap();

        std::fs::write(dir.source_path("mp4"), b"stale").unwrap();
        let source = dir.materialize_source(b"fresh", "mp4").await.unwrap();

        assert_eq!(std::fs::read(&source).unwrap(), b"fresh");
        dir.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn stale_directory_is_replaced() {
        let base = tempfile::tempdir().unwrap();
        let stale = base.path().join("v1");
        std::fs::create_dir_all(stale.join("hls")).unwrap();
        std::fs::write(stale.join("hls").join("old.ts"), b"x").unwrap();

        let space = ScratchSpace::new(base.path());
        let dir = space.create(&video_id()).await.unwrap();
        assert!(!dir.hls_dir().exists());
        dir.cleanup().await.unwrap();
    }

    #[tokio::test]
    async fn drop_removes_directory() {
        let base = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(base.path());
        {
            let dir = space.create(&video_id()).await.unwrap();
            std::fs::write(dir.path().join("frame.jpg"), b"x").unwrap();
        }
        assert!(!base.path().join("v1").exists());
    }

    #[tokio::test]
    async fn cleanup_of_missing_directory_succeeds() {
        let base = tempfile::tempdir().unwrap();
        let space = ScratchSpace::new(base.path());
        let dir = space.create(&video_id()).await.unwrap();
        std::fs::remove_dir_all(dir.path()).unwrap();
        assert!(dir.cleanup().await.is_ok());
    }
}

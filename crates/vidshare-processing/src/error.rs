//! Job failure taxonomy.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io;

use vidshare_core::{AppError, MessageError, Resolution, VideoId};
use vidshare_storage::StorageError;

/// Coarse classification used for logging and redelivery decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The message itself is malformed.
    Validation,
    /// Retrying the same job would fail the same way.
    Deterministic,
    /// Infrastructure failure; a later replay may succeed.
    Transient,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Validation => "validation",
            FailureKind::Deterministic => "deterministic",
            FailureKind::Transient => "transient",
        }
    }
}

impl Display for FailureKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Invalid job message: {0}")]
    InvalidMessage(#[from] MessageError),

    #[error("Video not found: {0}")]
    VideoNotFound(VideoId),

    #[error("Original upload missing at {bucket}/{key}")]
    SourceMissing { bucket: String, key: String },

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Thumbnail extraction failed: {0}")]
    ThumbnailFailed(String),

    #[error("Transcoding {resolution} failed: {message}")]
    TranscodeFailed {
        resolution: Resolution,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Record store error: {0}")]
    Database(#[from] AppError),

    #[error("Scratch directory error: {0}")]
    Scratch(#[from] io::Error),
}

impl JobError {
    pub fn kind(&self) -> FailureKind {
        match self {
            JobError::InvalidMessage(_) => FailureKind::Validation,
            JobError::VideoNotFound(_)
            | JobError::SourceMissing { .. }
            | JobError::ProbeFailed(_)
            | JobError::ThumbnailFailed(_)
            | JobError::TranscodeFailed { .. } => FailureKind::Deterministic,
            JobError::Storage(e) if e.is_transient() => FailureKind::Transient,
            JobError::Storage(_) => FailureKind::Deterministic,
            JobError::Database(e) if e.is_recoverable() => FailureKind::Transient,
            JobError::Database(_) => FailureKind::Deterministic,
            JobError::Scratch(_) => FailureKind::Transient,
        }
    }

    /// Whether a replay of the job could succeed.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == FailureKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vidshare_core::{EncodingJobMessage, VideoStatus};

    #[test]
    fn classification() {
        let malformed = EncodingJobMessage::parse(b"{}").unwrap_err();
        assert_eq!(JobError::from(malformed).kind(), FailureKind::Validation);

        let missing = JobError::SourceMissing {
            bucket: "private".into(),
            key: "u1/v2/video.mp4".into(),
        };
        assert_eq!(missing.kind(), FailureKind::Deterministic);
        assert!(!missing.is_recoverable());

        let upload = JobError::from(StorageError::UploadFailed("503".into()));
        assert_eq!(upload.kind(), FailureKind::Transient);
        assert!(upload.is_recoverable());

        let transition = JobError::from(AppError::InvalidTransition {
            from: VideoStatus::OriginalUploaded,
            to: VideoStatus::HlsEncodingCompleted,
        });
        assert_eq!(transition.kind(), FailureKind::Deterministic);

        let disk = JobError::from(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert_eq!(disk.kind(), FailureKind::Transient);
    }

    #[test]
    fn messages_name_the_rendition() {
        let err = JobError::TranscodeFailed {
            resolution: Resolution::P720,
            message: "exit status 1".into(),
        };
        assert_eq!(err.to_string(), "Transcoding 720p failed: exit status 1");
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use super::ids::{UserId, VideoId};
use super::stored_file::StoredFile;
use crate::ladder::Resolution;

/// Processing status of a video.
///
/// The pipeline only ever moves a video forward:
/// `ORIGINAL_UPLOADED` → `THUMBNAIL_GENERATED` → `HLS_ENCODING_COMPLETED`.
/// Re-encoding a completed video keeps it at `HLS_ENCODING_COMPLETED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "video_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoStatus {
    OriginalUploaded,
    ThumbnailGenerated,
    HlsEncodingCompleted,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::OriginalUploaded => "ORIGINAL_UPLOADED",
            VideoStatus::ThumbnailGenerated => "THUMBNAIL_GENERATED",
            VideoStatus::HlsEncodingCompleted => "HLS_ENCODING_COMPLETED",
        }
    }

    /// Whether the thumbnail stage still has to run for a video in this status.
    pub fn needs_thumbnail(&self) -> bool {
        matches!(self, VideoStatus::OriginalUploaded)
    }

    pub fn can_advance_to(&self, next: VideoStatus) -> bool {
        matches!(
            (self, next),
            (VideoStatus::OriginalUploaded, VideoStatus::ThumbnailGenerated)
                | (VideoStatus::ThumbnailGenerated, VideoStatus::HlsEncodingCompleted)
                | (VideoStatus::HlsEncodingCompleted, VideoStatus::HlsEncodingCompleted)
        )
    }
}

impl Display for VideoStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ORIGINAL_UPLOADED" => Ok(VideoStatus::OriginalUploaded),
            "THUMBNAIL_GENERATED" => Ok(VideoStatus::ThumbnailGenerated),
            "HLS_ENCODING_COMPLETED" => Ok(VideoStatus::HlsEncodingCompleted),
            other => Err(anyhow::anyhow!("Invalid video status: {}", other)),
        }
    }
}

/// A video record together with the relations the pipeline reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: VideoId,
    pub status: VideoStatus,
    pub owner_id: UserId,
    pub origin_metadata: StoredFile,
    pub thumbnail_metadata: Option<StoredFile>,
    pub video_hls_file_location: Option<String>,
    /// Renditions produced by the last successful encode, ascending.
    pub hls_renditions: Vec<Resolution>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Video {
    pub fn original_extension(&self) -> &str {
        &self.origin_metadata.extension
    }
}

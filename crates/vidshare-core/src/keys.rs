//! Object key layout in the private bucket.
//!
//! Every key is derived from the owner id and the video id alone, so a
//! redelivered job writes to exactly the same locations as the first attempt.

use std::path::Path;

use crate::ladder::Resolution;
use crate::models::{UserId, VideoId};

pub const MASTER_PLAYLIST: &str = "master.m3u8";
pub const RENDITION_PLAYLIST: &str = "index.m3u8";
pub const DEFAULT_THUMBNAIL_FILENAME: &str = "thumbnail.jpg";

pub const CONTENT_TYPE_M3U8: &str = "application/vnd.apple.mpegurl";
pub const CONTENT_TYPE_TS: &str = "video/mp2t";
pub const CONTENT_TYPE_JPEG: &str = "image/jpeg";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// `{ownerId}/{videoId}`
pub fn video_prefix(owner: &UserId, video: &VideoId) -> String {
    format!("{}/{}", owner, video)
}

/// `{ownerId}/{videoId}/video.{extension}`
pub fn original_key(owner: &UserId, video: &VideoId, extension: &str) -> String {
    format!(
        "{}/video.{}",
        video_prefix(owner, video),
        extension.trim_start_matches('.')
    )
}

/// `{ownerId}/{videoId}/{filename}`
pub fn thumbnail_key(owner: &UserId, video: &VideoId, filename: &str) -> String {
    format!("{}/{}", video_prefix(owner, video), filename)
}

/// `{ownerId}/{videoId}/master.m3u8`
pub fn master_key(owner: &UserId, video: &VideoId) -> String {
    format!("{}/{}", video_prefix(owner, video), MASTER_PLAYLIST)
}

/// Location persisted on the video record: `{bucket}/{ownerId}/{videoId}/master.m3u8`.
pub fn hls_location(bucket: &str, owner: &UserId, video: &VideoId) -> String {
    format!("{}/{}", bucket, master_key(owner, video))
}

/// ffmpeg output pattern for the segments of one rendition: `{h}p_%03d.ts`.
pub fn segment_pattern(resolution: Resolution) -> String {
    format!("{}_%03d.ts", resolution.label())
}

/// Content type chosen from a file extension.
pub fn content_type_for(path: impl AsRef<Path>) -> &'static str {
    let ext = path
        .as_ref()
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("m3u8") => CONTENT_TYPE_M3U8,
        Some("ts") => CONTENT_TYPE_TS,
        Some("jpg") | Some("jpeg") => CONTENT_TYPE_JPEG,
        _ => CONTENT_TYPE_OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (UserId, VideoId) {
        (UserId::parse("u1").unwrap(), VideoId::parse("v1").unwrap())
    }

    #[test]
    fn key_layout() {
        let (owner, video) = ids();
        assert_eq!(original_key(&owner, &video, "mp4"), "u1/v1/video.mp4");
        assert_eq!(original_key(&owner, &video, ".mov"), "u1/v1/video.mov");
        assert_eq!(
            thumbnail_key(&owner, &video, DEFAULT_THUMBNAIL_FILENAME),
            "u1/v1/thumbnail.jpg"
        );
        assert_eq!(master_key(&owner, &video), "u1/v1/master.m3u8");
        assert_eq!(
            hls_location("private", &owner, &video),
            "private/u1/v1/master.m3u8"
        );
        assert_eq!(segment_pattern(Resolution::P360), "360p_%03d.ts");
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("a/master.m3u8"), CONTENT_TYPE_M3U8);
        assert_eq!(content_type_for("720p/720p_001.ts"), CONTENT_TYPE_TS);
        assert_eq!(content_type_for("thumbnail.JPG"), CONTENT_TYPE_JPEG);
        assert_eq!(content_type_for("x.jpeg"), CONTENT_TYPE_JPEG);
        assert_eq!(content_type_for("notes.txt"), CONTENT_TYPE_OCTET_STREAM);
        assert_eq!(content_type_for("noext"), CONTENT_TYPE_OCTET_STREAM);
    }
}

//! Transcoder adapter: probing, still frames and HLS renditions.

mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use vidshare_core::Resolution;

/// Properties of the first video stream of a file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeResult {
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
}

impl ProbeResult {
    /// Middle of the video, used as the default thumbnail timestamp.
    pub fn midpoint_secs(&self) -> f64 {
        if self.duration_secs.is_finite() && self.duration_secs > 0.0 {
            self.duration_secs / 2.0
        } else {
            0.0
        }
    }
}

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Read dimensions and duration. A file without a video stream is an error.
    async fn probe(&self, input: &Path) -> Result<ProbeResult>;

    /// Write the frame at `timestamp_secs` to `output` as a JPEG.
    async fn extract_frame(&self, input: &Path, output: &Path, timestamp_secs: f64) -> Result<()>;

    /// Encode one rendition into `output_dir` as `index.m3u8` plus `{h}p_NNN.ts`
    /// segments of `segment_duration` seconds.
    async fn encode_rendition(
        &self,
        input: &Path,
        output_dir: &Path,
        resolution: Resolution,
        segment_duration: u32,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_handles_unknown_duration() {
        let probe = ProbeResult {
            width: 1920,
            height: 1080,
            duration_secs: 10.0,
        };
        assert_eq!(probe.midpoint_secs(), 5.0);

        let unknown = ProbeResult {
            duration_secs: f64::NAN,
            ..probe
        };
        assert_eq!(unknown.midpoint_secs(), 0.0);
    }
}

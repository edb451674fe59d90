use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use vidshare_core::keys::{segment_pattern, RENDITION_PLAYLIST};
use vidshare_core::Resolution;

use super::{ProbeResult, Transcoder};

/// Validate that a binary path doesn't contain shell metacharacters or dangerous sequences
fn validate_binary_path(path: &str) -> Result<()> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.trim().is_empty() {
        return Err(anyhow!("Binary path is empty"));
    }
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(anyhow!("Path contains dangerous characters: {}", path));
    }
    if path.contains("..") {
        return Err(anyhow!("Path contains directory traversal: {}", path));
    }
    Ok(())
}

/// Transcoder backed by the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: String, ffprobe_path: String) -> Result<Self> {
        validate_binary_path(&ffmpeg_path).context("Invalid ffmpeg_path")?;
        validate_binary_path(&ffprobe_path).context("Invalid ffprobe_path")?;
        Ok(Self {
            ffmpeg_path,
            ffprobe_path,
        })
    }

    async fn run_ffmpeg(&self, args: &[String], operation: &str) -> Result<()> {
        let output = Command::new(&self.ffmpeg_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "FFmpeg {} failed ({}): {}",
                operation,
                output.status,
                stderr.trim()
            ));
        }
        Ok(())
    }
}

/// Pull width, height and duration out of `ffprobe -print_format json` output.
fn parse_probe_output(stdout: &[u8]) -> Result<ProbeResult> {
    let probe_data: serde_json::Value =
        serde_json::from_slice(stdout).context("Failed to parse ffprobe output")?;

    let stream = probe_data["streams"]
        .get(0)
        .ok_or_else(|| anyhow!("No video stream found"))?;

    let width = stream["width"]
        .as_u64()
        .and_then(|w| u32::try_from(w).ok())
        .ok_or_else(|| anyhow!("Could not parse width"))?;

    let height = stream["height"]
        .as_u64()
        .and_then(|h| u32::try_from(h).ok())
        .ok_or_else(|| anyhow!("Could not parse height"))?;

    // Some containers only report the duration on the stream.
    let duration_secs = probe_data["format"]["duration"]
        .as_str()
        .or_else(|| stream["duration"].as_str())
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    Ok(ProbeResult {
        width,
        height,
        duration_secs,
    })
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    #[tracing::instrument(skip(self), fields(
        process.executable.name = "ffprobe",
        process.executable.path = %self.ffprobe_path,
        ffmpeg.operation = "probe"
    ))]
    async fn probe(&self, input: &Path) -> Result<ProbeResult> {
        let start = std::time::Instant::now();

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(input)
            .stdin(Stdio::null())
            .output()
            .await
            .context("Failed to execute ffprobe")?;

        if !output.status.success() {
            return Err(anyhow!(
                "ffprobe failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let probe = parse_probe_output(&output.stdout)?;

        tracing::info!(
            duration_ms = start.elapsed().as_millis(),
            video_duration = probe.duration_secs,
            width = probe.width,
            height = probe.height,
            "Video probe completed"
        );

        Ok(probe)
    }

    #[tracing::instrument(skip(self), fields(process.executable.name = "ffmpeg", ffmpeg.operation = "thumbnail"))]
    async fn extract_frame(&self, input: &Path, output: &Path, timestamp_secs: f64) -> Result<()> {
        let args = vec![
            "-y".to_string(),
            "-ss".to_string(),
            format!("{:.3}", timestamp_secs.max(0.0)),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-q:v".to_string(),
            "2".to_string(),
            output.to_string_lossy().to_string(),
        ];

        self.run_ffmpeg(&args, "thumbnail extraction").await
    }

    #[tracing::instrument(skip(self, input, output_dir), fields(
        process.executable.name = "ffmpeg",
        ffmpeg.operation = "hls",
        resolution = %resolution
    ))]
    async fn encode_rendition(
        &self,
        input: &Path,
        output_dir: &Path,
        resolution: Resolution,
        segment_duration: u32,
    ) -> Result<()> {
        let start = std::time::Instant::now();
        let playlist_path = output_dir.join(RENDITION_PLAYLIST);
        let segment_path = output_dir.join(segment_pattern(resolution));

        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-vf".to_string(),
            format!("scale=-2:{}", resolution.height()),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "veryfast".to_string(),
            "-profile:v".to_string(),
            "main".to_string(),
            "-crf".to_string(),
            "23".to_string(),
            "-force_key_frames".to_string(),
            format!("expr:gte(t,n_forced*{})", segment_duration),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            "-ac".to_string(),
            "2".to_string(),
            "-f".to_string(),
            "hls".to_string(),
            "-hls_time".to_string(),
            segment_duration.to_string(),
            "-hls_playlist_type".to_string(),
            "vod".to_string(),
            "-hls_segment_filename".to_string(),
            segment_path.to_string_lossy().to_string(),
            playlist_path.to_string_lossy().to_string(),
        ];

        self.run_ffmpeg(&args, "HLS encoding").await?;

        tracing::info!(
            resolution = %resolution,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Rendition encoded"
        );
        Ok(())
    }
}

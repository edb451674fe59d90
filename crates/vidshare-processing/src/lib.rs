//! Vidshare processing
//!
//! The stages of an encoding job (thumbnail, HLS renditions) and the
//! orchestrator that runs them against the record store and object storage.

pub mod error;
pub mod hls;
pub mod orchestration;
pub mod scratch;
pub mod thumbnail;
pub mod transcoder;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use error::{FailureKind, JobError};
pub use hls::{HlsOutput, HlsRequest, HlsStage};
pub use orchestration::{JobHandler, JobOutcome, OrchestratorConfig, VideoOrchestrator};
pub use scratch::{ScratchDir, ScratchSpace};
pub use thumbnail::{ThumbnailRequest, ThumbnailStage};
pub use transcoder::{FfmpegTranscoder, ProbeResult, Transcoder};

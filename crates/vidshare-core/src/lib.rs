//! Vidshare Core Library
//!
//! Domain models, the rendition ladder, the object key layout, configuration and
//! error types shared by every crate of the video-processing pipeline.

pub mod config;
pub mod error;
pub mod keys;
pub mod ladder;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::WorkerConfig;
pub use error::AppError;
pub use ladder::{select_renditions, Resolution, RESOLUTION_LADDER, SEGMENT_DURATION_SECS};
pub use models::{
    DeliveryMode, EncodingJob, EncodingJobMessage, IdError, MessageError, NewStoredFile,
    StoredFile, UserId, Video, VideoId, VideoStatus,
};
pub use storage_types::StorageBackend;

//! Vidshare Storage Library
//!
//! Object store client used by the video pipeline. It knows nothing about
//! videos: callers pass a bucket and a key and get bytes in or out.
//!
//! # Storage key format
//!
//! Keys are `/`-separated relative paths such as `{ownerId}/{videoId}/master.m3u8`.
//! Keys must not be empty, contain `..` segments or start with `/`. The layout
//! itself lives in `vidshare_core::keys`.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult, UploadedObject};
pub use vidshare_core::StorageBackend;

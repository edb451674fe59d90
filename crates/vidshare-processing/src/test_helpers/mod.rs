//! Test doubles for exercising the pipeline without ffmpeg or a real object store
//!
//! Enabled with the `test-helpers` feature.

mod fakes;

pub use fakes::{FakeTranscoder, FaultyStorage, TranscoderCall};

//! Vidshare record store
//!
//! The pipeline reads a video with its stored-file relations and writes all of
//! a job's mutations through a single [`VideoTransaction`].

#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;
pub mod postgres;
pub mod setup;
pub mod store;
pub mod transaction;

#[cfg(any(test, feature = "test-helpers"))]
pub use memory::MemoryVideoStore;
pub use postgres::{PgVideoStore, PgVideoTransaction};
pub use setup::setup_database;
pub use store::{VideoStore, VideoTransaction};
pub use transaction::TransactionGuard;

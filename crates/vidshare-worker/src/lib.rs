//! Vidshare worker
//!
//! Consumes encoding jobs from an AMQP queue and hands them to the video
//! orchestrator. Each consumer slot owns one channel with prefetch 1, so a slot
//! never holds more than one unacknowledged job.

pub mod consumer;
pub mod pool;
pub mod publisher;
pub mod telemetry;

pub use consumer::{handle_delivery, Disposition, JobAcker, LapinAcker};
pub use pool::{declare_queue, ConsumerPool, ConsumerPoolConfig};
pub use publisher::JobPublisher;
pub use telemetry::{init_telemetry, shutdown_telemetry};

//! Delivery handling: decode, dispatch, acknowledge.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lapin::acker::Acker;
use lapin::options::{BasicAckOptions, BasicNackOptions};

use vidshare_core::EncodingJobMessage;
use vidshare_processing::{JobError, JobHandler};

/// Explicit settlement of one delivery.
#[async_trait]
pub trait JobAcker: Send + Sync {
    async fn ack(&self) -> Result<()>;
    async fn nack(&self, requeue: bool) -> Result<()>;
}

/// [`JobAcker`] over a lapin delivery.
pub struct LapinAcker {
    acker: Acker,
}

impl LapinAcker {
    pub fn new(acker: Acker) -> Self {
        Self { acker }
    }
}

#[async_trait]
impl JobAcker for LapinAcker {
    async fn ack(&self) -> Result<()> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map(|_| ())
            .context("Failed to ack delivery")
    }

    async fn nack(&self, requeue: bool) -> Result<()> {
        self.acker
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await
            .map(|_| ())
            .context("Failed to nack delivery")
    }
}

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Acked,
    Rejected,
}

/// Process one delivery and settle it.
///
/// Only a successful job is acknowledged. Malformed payloads are rejected
/// before the handler is called; every other failure is rejected without
/// requeue and left for an operator to replay.
pub async fn handle_delivery(
    handler: &dyn JobHandler,
    payload: &[u8],
    acker: &dyn JobAcker,
) -> Disposition {
    let job = match EncodingJobMessage::parse(payload) {
        Ok(job) => job,
        Err(e) => {
            let err = JobError::from(e);
            tracing::warn!(
                error = %err,
                kind = %err.kind(),
                payload_bytes = payload.len(),
                "Rejecting malformed job message"
            );
            reject(acker).await;
            return Disposition::Rejected;
        }
    };

    match handler.handle(&job).await {
        Ok(outcome) => {
            if let Err(e) = acker.ack().await {
                tracing::error!(video_id = %job.video_id, error = %e, "Failed to acknowledge job");
            }
            tracing::info!(
                video_id = %outcome.video_id,
                pattern = %job.pattern,
                rendition_count = outcome.renditions.len(),
                hls_location = %outcome.hls_location,
                "Job acknowledged"
            );
            Disposition::Acked
        }
        Err(e) => {
            tracing::error!(
                video_id = %job.video_id,
                error = %e,
                kind = %e.kind(),
                recoverable = e.is_recoverable(),
                "Job failed, rejecting without requeue"
            );
            reject(acker).await;
            Disposition::Rejected
        }
    }
}

async fn reject(acker: &dyn JobAcker) {
    if let Err(e) = acker.nack(false).await {
        tracing::error!(error = %e, "Failed to reject delivery");
    }
}

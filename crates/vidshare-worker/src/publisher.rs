//! Job producer: hands an uploaded video to the encoding queue.

use anyhow::{anyhow, Context, Result};
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::{BasicProperties, Channel, Connection};

use vidshare_core::{DeliveryMode, EncodingJobMessage, VideoId};

use crate::pool::declare_queue;

const CONTENT_TYPE_JSON: &str = "application/json";

/// Publishes persistent encoding jobs with publisher confirms.
pub struct JobPublisher {
    channel: Channel,
    queue: String,
}

impl JobPublisher {
    /// Open a confirm-mode channel and make sure the queue exists.
    pub async fn new(connection: &Connection, queue: impl Into<String>) -> Result<Self> {
        let queue = queue.into();
        let channel = connection
            .create_channel()
            .await
            .context("Failed to open publisher channel")?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;
        declare_queue(&channel, &queue).await?;

        Ok(Self { channel, queue })
    }

    /// Publish one job and wait for the broker to confirm it.
    #[tracing::instrument(skip(self), fields(queue = %self.queue, video_id = %video_id))]
    pub async fn publish(&self, video_id: &VideoId) -> Result<()> {
        let message = EncodingJobMessage::new(video_id);
        let payload = message
            .to_bytes()
            .context("Failed to serialize job message")?;

        let confirmation = self
            .channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default()
                    .with_delivery_mode(DeliveryMode::Persistent.as_u8())
                    .with_content_type(CONTENT_TYPE_JSON.into()),
            )
            .await
            .context("Failed to publish job")?
            .await
            .context("Failed to receive publisher confirm")?;

        if confirmation.is_nack() {
            return Err(anyhow!("Broker rejected job for video {}", video_id));
        }

        tracing::info!(
            pattern = %message.pattern,
            size_bytes = payload.len(),
            "Job published"
        );
        Ok(())
    }
}

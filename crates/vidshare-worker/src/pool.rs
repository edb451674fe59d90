//! Consumer slot pool.
//!
//! Shutdown: cancelling the token stops every slot from taking new deliveries.
//! A job that is already running is finished and settled first.

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicConsumeOptions, BasicQosOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, Queue};
use std::sync::Arc;
use tokio::select;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use vidshare_core::WorkerConfig;
use vidshare_processing::JobHandler;

use crate::consumer::{handle_delivery, LapinAcker};

#[derive(Debug, Clone)]
pub struct ConsumerPoolConfig {
    pub queue: String,
    pub slots: usize,
    pub prefetch: u16,
    pub consumer_tag_prefix: String,
}

impl ConsumerPoolConfig {
    pub fn from_worker_config(config: &WorkerConfig) -> Self {
        Self {
            queue: config.encoding_queue.clone(),
            slots: config.consumer_slots,
            prefetch: config.consumer_prefetch,
            consumer_tag_prefix: "vidshare-worker".to_string(),
        }
    }
}

/// Declare the durable job queue.
pub async fn declare_queue(channel: &Channel, name: &str) -> Result<Queue> {
    let queue = channel
        .queue_declare(
            name,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .with_context(|| format!("Failed to declare queue {}", name))?;

    tracing::info!(
        queue = %name,
        messages = queue.message_count(),
        consumers = queue.consumer_count(),
        "Queue declared"
    );
    Ok(queue)
}

/// Fixed set of consumer slots, one channel each.
pub struct ConsumerPool {
    connection: Connection,
    handler: Arc<dyn JobHandler>,
    config: ConsumerPoolConfig,
}

impl ConsumerPool {
    pub fn new(
        connection: Connection,
        handler: Arc<dyn JobHandler>,
        config: ConsumerPoolConfig,
    ) -> Self {
        Self {
            connection,
            handler,
            config,
        }
    }

    /// Run every slot until `shutdown` is cancelled or a slot fails.
    ///
    /// A failing slot cancels the others; its error is returned once all
    /// slots have stopped.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        tracing::info!(
            queue = %self.config.queue,
            slots = self.config.slots,
            prefetch = self.config.prefetch,
            "Starting consumer pool"
        );

        let mut slots = JoinSet::new();
        for idx in 0..self.config.slots {
            let channel = self
                .connection
                .create_channel()
                .await
                .context("Failed to open consumer channel")?;
            let slot = ConsumerSlot {
                idx,
                channel,
                handler: self.handler.clone(),
                queue: self.config.queue.clone(),
                consumer_tag: format!("{}-{}", self.config.consumer_tag_prefix, idx),
                prefetch: self.config.prefetch,
            };
            slots.spawn(slot.run(shutdown.child_token()));
        }

        let mut first_error = None;
        while let Some(joined) = slots.join_next().await {
            let result = joined
                .map_err(|e| anyhow!("consumer slot panicked: {}", e))
                .and_then(|r| r);
            if let Err(e) = result {
                tracing::error!(error = %e, "Consumer slot stopped with an error");
                shutdown.cancel();
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = self.connection.close(200, "worker shutdown").await {
            tracing::warn!(error = %e, "Failed to close AMQP connection");
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                tracing::info!("Consumer pool stopped");
                Ok(())
            }
        }
    }
}

struct ConsumerSlot {
    idx: usize,
    channel: Channel,
    handler: Arc<dyn JobHandler>,
    queue: String,
    consumer_tag: String,
    prefetch: u16,
}

impl ConsumerSlot {
    async fn run(self, shutdown: CancellationToken) -> Result<()> {
        self.channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await
            .context("Failed to set prefetch")?;

        let mut consumer = self
            .channel
            .basic_consume(
                &self.queue,
                &self.consumer_tag,
                BasicConsumeOptions {
                    no_ack: false,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .with_context(|| format!("Failed to consume from {}", self.queue))?;

        tracing::info!(slot = self.idx, consumer_tag = %self.consumer_tag, "Consumer slot ready");

        loop {
            select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!(slot = self.idx, "Consumer slot shutting down");
                    break;
                }
                delivery = consumer.next() => {
                    let Some(delivery) = delivery else {
                        return Err(anyhow!("consumer stream closed for slot {}", self.idx));
                    };
                    let delivery = delivery.context("Failed to receive delivery")?;
                    self.process(delivery).await;
                }
            }
        }

        if let Err(e) = self.channel.close(200, "slot shutdown").await {
            tracing::warn!(slot = self.idx, error = %e, "Failed to close channel");
        }
        Ok(())
    }

    async fn process(&self, delivery: Delivery) {
        let Delivery {
            delivery_tag,
            redelivered,
            data,
            acker,
            ..
        } = delivery;

        tracing::debug!(
            slot = self.idx,
            delivery_tag,
            redelivered,
            "Delivery received"
        );

        let acker = LapinAcker::new(acker);
        let disposition = handle_delivery(self.handler.as_ref(), &data, &acker).await;
        tracing::debug!(slot = self.idx, delivery_tag, ?disposition, "Delivery settled");
    }
}

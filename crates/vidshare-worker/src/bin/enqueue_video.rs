use anyhow::{Context, Result};
use clap::Parser;
use lapin::{Connection, ConnectionProperties};

use vidshare_core::VideoId;
use vidshare_worker::JobPublisher;

#[derive(Parser, Debug)]
#[command(name = "enqueue_video")]
#[command(about = "Publish encoding jobs for uploaded videos")]
struct Args {
    /// Video ids to enqueue
    #[arg(required = true, value_name = "VIDEO_ID")]
    video_ids: Vec<String>,

    /// AMQP broker URL
    #[arg(long, env = "AMQP_URL", default_value = "amqp://127.0.0.1:5672/%2f")]
    amqp_url: String,

    /// Queue to publish to
    #[arg(long, env = "ENCODING_QUEUE", default_value = "video_encoding")]
    queue: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let ids = args
        .video_ids
        .iter()
        .map(|id| VideoId::parse(id.as_str()).with_context(|| format!("Invalid video id {:?}", id)))
        .collect::<Result<Vec<_>>>()?;

    let connection = Connection::connect(&args.amqp_url, ConnectionProperties::default())
        .await
        .context("Failed to connect to AMQP broker")?;
    let publisher = JobPublisher::new(&connection, args.queue.clone()).await?;

    for id in &ids {
        publisher.publish(id).await?;
        println!("enqueued {}", id);
    }

    connection
        .close(200, "done")
        .await
        .context("Failed to close AMQP connection")?;
    Ok(())
}

use anyhow::{Context, Result};
use lapin::{Connection, ConnectionProperties};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use vidshare_core::WorkerConfig;
use vidshare_db::{setup_database, PgVideoStore};
use vidshare_processing::{FfmpegTranscoder, OrchestratorConfig, VideoOrchestrator};
use vidshare_storage::create_storage;
use vidshare_worker::{
    declare_queue, init_telemetry, shutdown_telemetry, ConsumerPool, ConsumerPoolConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = WorkerConfig::from_env()?;

    init_telemetry(&config.environment, config.is_production())?;

    tracing::info!(
        environment = %config.environment,
        storage_backend = %config.storage_backend,
        queue = %config.encoding_queue,
        slots = config.consumer_slots,
        "Starting vidshare worker"
    );

    let pool = setup_database(&config).await?;
    let store = Arc::new(PgVideoStore::new(pool));

    let storage = create_storage(&config)
        .await
        .context("Failed to initialize storage backend")?;

    let transcoder = Arc::new(
        FfmpegTranscoder::new(config.ffmpeg_path.clone(), config.ffprobe_path.clone())
            .context("Failed to initialize transcoder")?,
    );

    tokio::fs::create_dir_all(&config.scratch_dir)
        .await
        .with_context(|| format!("Failed to create scratch dir {}", config.scratch_dir.display()))?;

    let orchestrator = Arc::new(VideoOrchestrator::new(
        store,
        storage,
        transcoder,
        OrchestratorConfig::from_worker_config(&config),
    ));

    let connection = Connection::connect(&config.amqp_url, ConnectionProperties::default())
        .await
        .context("Failed to connect to AMQP broker")?;
    let setup_channel = connection
        .create_channel()
        .await
        .context("Failed to open setup channel")?;
    declare_queue(&setup_channel, &config.encoding_queue).await?;
    setup_channel
        .close(200, "setup done")
        .await
        .context("Failed to close setup channel")?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
        }
        signal_token.cancel();
    });

    let consumers = ConsumerPool::new(
        connection,
        orchestrator,
        ConsumerPoolConfig::from_worker_config(&config),
    );
    let result = consumers.run(shutdown).await;

    shutdown_telemetry().await;
    result
}

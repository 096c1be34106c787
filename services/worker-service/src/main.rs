//! Worker service entry point.

use std::sync::Arc;

use courier::{
    CourierConfig, RedisIdempotencyStore, RedisQueue, Shutdown, Worker, WorkerPool, WorkerSettings,
    WorkerStats,
};
use redis::Client;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use worker_service::{RedisResultSink, WorkerServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = WorkerServiceConfig::from_env()?.load()?;

    init_tracing(&config);

    // Validated during load; repeated so warnings reach the subscriber
    config.validate()?;

    info!(
        queue = %config.queue.name,
        dead_letter = %config.queue.dead_letter,
        concurrency = config.worker.concurrency,
        "Starting worker service"
    );

    // Results are written through one shared connection
    let client = Client::open(config.redis.url.as_str())?;
    let sink = Arc::new(RedisResultSink::new(
        client.get_connection_manager().await?,
        config.sink.key_prefix.as_str(),
    ));
    let idempotency = Arc::new(RedisIdempotencyStore::connect(&config.redis.url).await?);

    info!(url = %config.redis.url, "Connected to Redis");

    let shutdown = Shutdown::new();
    let mut pool = WorkerPool::new(shutdown.clone(), Arc::new(WorkerStats::default()));
    let settings = WorkerSettings::from_config(&config);

    for index in 0..config.worker.concurrency {
        // BLPOP holds its connection, so every loop gets its own
        let queue = RedisQueue::connect(&config.redis.url).await?;
        pool.spawn(Worker::new(
            format!("{}-{index}", config.worker.name),
            Arc::new(queue),
            idempotency.clone(),
            sink.clone(),
            settings.clone(),
        ));
    }

    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    pool.join().await?;
    Ok(())
}

fn init_tracing(config: &CourierConfig) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    if config.log.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, finishing in-flight jobs"),
        () = terminate => info!("Received SIGTERM, finishing in-flight jobs"),
    }
}

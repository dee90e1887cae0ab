//! Reformatting worker binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reframe_queue::TaskQueue;
use reframe_store::TaskStore;
use reframe_worker::{Executor, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("reframe=info".parse().expect("valid directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("starting reframe-worker");

    let config = WorkerConfig::from_env();
    info!("worker config: {:?}", config);

    let store = Arc::new(
        TaskStore::open(&config.working_dir)
            .await
            .context("failed to open task store")?,
    );
    let queue = Arc::new(TaskQueue::new());
    let executor = Arc::new(Executor::new(config, store, queue));

    // Setup signal handler
    let shutdown_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal");
        shutdown_executor.shutdown();
    });

    executor.run().await.context("executor failed")?;

    info!("worker shutdown complete");
    Ok(())
}

#![doc = include_str!("../README.md")]

mod worker;

use clap::Parser;
use std::sync::Arc;
use worker::config::{CliArgs, WorkerConfig};
use worker::pool::ConnectionPool;
use worker::relay::Relay;
use worker::service::{ContactService, serve};
use worker::store::postgres::PgConn;
use worker::telemetry::{init_telemetry, shutdown_telemetry};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// The request loop is sequential by contract, so a single-threaded runtime
// is enough; the connection driver tasks run cooperatively alongside it.
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = WorkerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let database_url = config.database_url.clone();
    let pool = ConnectionPool::initialize(config.pool_capacity, || {
        let url = database_url.clone();
        async move { PgConn::connect(&url).await }
    })
    .await?;

    log_startup_info(&config, pool.capacity());

    let service = ContactService::new(Arc::clone(&pool));
    let relay = Relay::new(tokio::io::stdin(), tokio::io::stdout());
    let result = serve(relay, service).await;

    match &result {
        Ok(()) => {
            #[cfg(feature = "tracing")]
            tracing::info!("Worker shut down cleanly");
        }
        Err(_e) => {
            #[cfg(feature = "tracing")]
            tracing::error!("Worker terminating: {_e}");
        }
    }

    shutdown_telemetry(providers);

    Ok(result?)
}

fn log_startup_info(_config: &WorkerConfig, _capacity: usize) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting contact worker with {} pooled connections and full config: {:#?}",
            _capacity,
            _config
        );
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Starting contact worker with {} pooled connections ({} cores / {} workers)",
            _capacity,
            _config.cpu_cores,
            _config.worker_count
        );
    }
}

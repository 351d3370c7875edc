//! # Corpnet Worker
//!
//! Processes the jobs the API writes to the `jobs` table: event stats
//! recounts and notifications published over Redis.
//!
//! ```bash
//! cargo run -p corpnet-worker
//! ```

use corpnet_shared::db::pool::{create_pool, DatabaseConfig};
use corpnet_shared::logging::init_tracing;
use corpnet_shared::redis::RedisClient;
use corpnet_worker::config::WorkerConfig;
use corpnet_worker::handlers::HandlerRegistry;
use corpnet_worker::notifier::Notifier;
use corpnet_worker::orchestrator::WorkerOrchestrator;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("corpnet_worker=debug,corpnet_shared=info");

    tracing::info!("Corpnet Worker v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = WorkerConfig::from_env()?;

    let db = create_pool(
        DatabaseConfig::from_url(config.database_url.clone())
            .with_max_connections(config.database_max_connections),
    )
    .await?;
    let redis = RedisClient::new(config.redis.clone()).await?;

    let notifier = Arc::new(Notifier::new(db.clone(), redis));
    let orchestrator = WorkerOrchestrator::new(
        db,
        notifier,
        HandlerRegistry::with_defaults(),
        config.orchestrator.clone(),
    );

    let shutdown = orchestrator.shutdown_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        shutdown.cancel();
    });

    orchestrator.run().await
}

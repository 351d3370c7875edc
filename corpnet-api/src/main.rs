//! # Corpnet API Server
//!
//! Serves the `/v1` HTTP resources. Follow-up work (stats recounts and
//! notifications) is written to the job table and handled by `corpnet-worker`.
//!
//! ```bash
//! cargo run -p corpnet-api
//! ```

use corpnet_api::{
    app::{build_router, AppState},
    config::Config,
};
use corpnet_shared::db::{migrations::run_migrations, pool};
use corpnet_shared::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("corpnet_api=debug,corpnet_shared=info,tower_http=debug");

    tracing::info!("Corpnet API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let db_config = pool::DatabaseConfig::from_url(config.database.url.clone())
        .with_max_connections(config.database.max_connections);
    let db = pool::create_pool(db_config).await?;

    if config.api.run_migrations {
        run_migrations(&db).await?;
    }

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(db, config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}

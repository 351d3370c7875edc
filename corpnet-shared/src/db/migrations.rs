//! Embedded schema migrations
//!
//! Migration files live in the workspace-level `migrations/` directory and are
//! compiled into the binary with `sqlx::migrate!`. The API server applies them
//! at startup unless `RUN_MIGRATIONS=false`.

use sqlx::{migrate::Migrator, postgres::PgPool};
use tracing::{error, info};

/// All migrations shipped with this build
pub static MIGRATOR: Migrator = sqlx::migrate!("../migrations");

/// Applies every pending migration
///
/// # Errors
///
/// Returns the first migration failure; sqlx runs each file in a transaction.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!(
        available = MIGRATOR.iter().count(),
        "Applying database migrations"
    );

    MIGRATOR.run(pool).await.map_err(|e| {
        error!(error = %e, "Migration failed");
        e
    })?;

    info!("Database schema is up to date");
    Ok(())
}

/// Latest migration version applied to the database, if any
pub async fn applied_version(pool: &PgPool) -> Result<Option<i64>, sqlx::Error> {
    let version: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(version) FROM _sqlx_migrations WHERE success = TRUE",
    )
    .fetch_one(pool)
    .await?;

    Ok(version)
}

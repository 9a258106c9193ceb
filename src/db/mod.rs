use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use crate::config::DatabaseConfig;

/// Type alias for the PostgreSQL connection pool
pub type DbPool = PgPool;

/// Advisory lock namespaces. Each stateful component serializes work per key
/// inside its own namespace so an owner id and a client IP never collide.
#[derive(Debug, Clone, Copy)]
#[repr(i32)]
pub enum LockNamespace {
    Ledger = 1,
    RateLimit = 2,
}

/// Creates a new database connection pool with the provided configuration
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    log::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(Some(config.idle_timeout))
        .max_lifetime(Some(config.max_lifetime))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Charge dates are bucketed in UTC
                sqlx::query("SET timezone = 'UTC'").execute(conn).await?;
                Ok(())
            })
        })
        .connect(&config.url)
        .await?;

    log::info!(
        "Database connection pool established (max: {}, min: {})",
        config.max_connections,
        config.min_connections
    );

    Ok(pool)
}

/// Runs all pending database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    log::info!("Running database migrations...");

    sqlx::migrate!("./migrations").run(pool).await?;

    log::info!("Database migrations completed successfully");
    Ok(())
}

/// Performs a health check on the database connection
pub async fn health_check(pool: &DbPool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

/// Opens a transaction that holds the advisory lock for `key` in `namespace`.
///
/// The lock is transaction-scoped: it is released on commit or rollback
/// (including when the transaction is dropped on an error path). Every
/// operation on one owner or one limiter key goes through here, which makes
/// that key single-writer across all server processes sharing the database.
pub async fn begin_keyed(
    pool: &DbPool,
    namespace: LockNamespace,
    key: &str,
) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT pg_advisory_xact_lock($1, hashtext($2))")
        .bind(namespace as i32)
        .bind(key)
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}

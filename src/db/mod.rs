//! Database connection and pool management for the portal store
//!
//! This module handles SQLite connection pooling and the versioned schema
//! (migrations under `./migrations`).

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

/// Database connection error
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(String),

    #[error("Failed to run migrations: {0}")]
    MigrationError(String),

    #[error("Database health check failed: {0}")]
    HealthCheckError(String),

    #[error("Failed to seed data: {0}")]
    SeedError(String),
}

/// How long a writer waits for the lock before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a database connection pool
pub async fn create_pool(config: &Config) -> Result<SqlitePool, DbError> {
    tracing::info!("Connecting to database at {}", config.database_url_masked());

    let in_memory = config.database_url.contains(":memory:");

    let mut connect = SqliteConnectOptions::from_str(&config.database_url)
        .map_err(|e| DbError::ConnectionError(e.to_string()))?
        .busy_timeout(BUSY_TIMEOUT);
    if !in_memory {
        connect = connect
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
    }

    // Every connection to an in-memory database sees its own empty store,
    // so keep exactly one connection alive for the pool's lifetime.
    let options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.db_max_connections)
            .idle_timeout(Duration::from_secs(600))
    };

    let pool = options
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(connect)
        .await
        .map_err(|e| DbError::ConnectionError(e.to_string()))?;

    tracing::info!("Database connection pool created successfully");

    Ok(pool)
}

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DbError::MigrationError(e.to_string()))?;

    tracing::info!("Database migrations completed successfully");

    Ok(())
}

/// Check database connectivity (for health checks)
pub async fn check_health(pool: &SqlitePool) -> Result<(), DbError> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::HealthCheckError(e.to_string()))?;

    Ok(())
}

/// Begin a transaction that holds the write lock from its first statement.
///
/// A deferred transaction that reads before writing cannot upgrade its lock
/// while another writer is active and fails with `SQLITE_BUSY` at once.
/// Writing first makes concurrent writers queue on the busy timeout instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE write_lock SET touched_at = ? WHERE id = 1")
        .bind(chrono::Utc::now())
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Open the pool and bring the schema up to date
pub async fn connect_and_migrate(config: &Config) -> Result<SqlitePool, DbError> {
    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

/// Sample offerings: title, location, PKR per token, tokens, yield (bps)
const DEMO_CATALOG: [(&str, &str, i64, i64, i64); 3] = [
    ("DHA Phase 6 Residency", "Lahore", 89_200, 2_000, 850),
    ("Clifton Seaview Apartments", "Karachi", 125_000, 1_200, 920),
    ("Blue Area Office Tower", "Islamabad", 54_500, 5_000, 1_050),
];

/// Fill an empty property table with the sample catalog. Returns how many
/// rows were inserted.
pub async fn seed_demo_catalog(pool: &SqlitePool) -> Result<u64, DbError> {
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM properties")
        .fetch_one(pool)
        .await
        .map_err(|e| DbError::SeedError(e.to_string()))?;
    if existing > 0 {
        return Ok(0);
    }

    let now = chrono::Utc::now();
    let mut inserted = 0;
    for (title, location, price, tokens, yield_bps) in DEMO_CATALOG {
        inserted += sqlx::query(
            r#"
            INSERT INTO properties (id, title, location, price_per_token, total_tokens, available_tokens, expected_yield_bps, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'open', ?)
            "#,
        )
        .bind(uuid::Uuid::new_v4())
        .bind(title)
        .bind(location)
        .bind(price)
        .bind(tokens)
        .bind(tokens)
        .bind(yield_bps)
        .bind(now)
        .execute(pool)
        .await
        .map_err(|e| DbError::SeedError(e.to_string()))?
        .rows_affected();
    }

    tracing::info!(inserted, "Seeded demo property catalog");
    Ok(inserted)
}

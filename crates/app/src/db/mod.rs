//! Database operations for the app's `PostgreSQL`.
//!
//! ## Tables
//!
//! - `shop_sessions` - Offline Admin API tokens, one row per installed shop
//! - `tower_sessions.session` - Browser sessions for the OAuth handshake
//!
//! # Migrations
//!
//! Migrations are stored in `crates/app/migrations/` and run via:
//! ```bash
//! cargo run -p canopy-cli -- migrate
//! ```

pub mod sessions;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

pub use sessions::{ShopSession, ShopSessionRepository};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// An app migration failed to apply.
    #[error("migration error: {0}")]
    Migrate(#[from] MigrateError),

    /// The browser session table could not be created.
    #[error("session store migration error: {0}")]
    SessionStore(#[from] sqlx::Error),
}

/// Apply pending app migrations and create the browser session table.
///
/// # Errors
///
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrationError> {
    MIGRATOR.run(pool).await?;
    PostgresStore::new(pool.clone()).migrate().await?;
    Ok(())
}

//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! chemstock-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `CHEMSTOCK_DATABASE_URL` - `PostgreSQL` connection string
//!
//! Migration files live in `crates/server/migrations/` and are embedded into
//! the binary at compile time.

use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the stock ledger migrations.
///
/// # Errors
///
/// Returns `MigrationError` when the database is unreachable or a migration
/// fails to apply.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("CHEMSTOCK_DATABASE_URL")
        .map_err(|_| MigrationError::MissingEnvVar("CHEMSTOCK_DATABASE_URL"))?;

    tracing::info!("Connecting to stock ledger database...");
    let pool = PgPool::connect(&database_url).await?;

    tracing::info!("Running stock ledger migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}

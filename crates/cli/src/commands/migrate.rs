//! Database migration command.
//!
//! # Environment Variables
//!
//! - `CARTWHEEL_DATABASE_URL` - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! `crates/server/migrations/`, embedded at build time.

use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Apply every pending migration.
///
/// # Errors
///
/// Returns `MigrationError` if the URL is unset, the connection fails, or a
/// migration fails to apply.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("CARTWHEEL_DATABASE_URL")
        .map_err(|_| MigrationError::MissingEnvVar("CARTWHEEL_DATABASE_URL"))?;

    info!("Connecting to database...");
    let pool = sqlx::PgPool::connect(&database_url).await?;

    info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}

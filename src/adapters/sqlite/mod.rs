//! SQLite persistence for state carried between cycles.

pub mod connection;
pub mod cooldown_store;
pub mod migrations;

pub use connection::{create_pool, create_test_pool, ConnectionError};
pub use cooldown_store::SqliteCooldownStore;
pub use migrations::{all_embedded_migrations, Migration, MigrationError, Migrator};

use sqlx::SqlitePool;

use crate::domain::models::DatabaseConfig;

#[derive(Debug, thiserror::Error)]
pub enum InitializationError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
}

/// Open the configured database and bring its schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool, InitializationError> {
    let pool = create_pool(config).await?;
    let applied = Migrator::new(pool.clone())
        .run_embedded_migrations(all_embedded_migrations())
        .await?;
    if applied > 0 {
        tracing::info!(applied, path = %config.path, "database migrated");
    }
    Ok(pool)
}

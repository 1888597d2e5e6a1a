//! Embedded schema migrations.
//!
//! Migrations run over a synchronous `PgConnection` on the blocking pool, the
//! async pool is not involved.

use diesel::Connection;
use diesel::pg::PgConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::error::StorageError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

fn connect(database_url: &str) -> Result<PgConnection, StorageError> {
    PgConnection::establish(database_url).map_err(StorageError::connection)
}

fn migration_error(operation: &str, error: impl std::fmt::Display) -> StorageError {
    StorageError::Migration(format!("{}: {}", operation, error))
}

async fn blocking<T, F>(f: F) -> Result<T, StorageError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StorageError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| migration_error("migration task", e))?
}

/// Names of migrations not yet applied
pub async fn pending_migrations(database_url: &str) -> Result<Vec<String>, StorageError> {
    let database_url = database_url.to_string();
    blocking(move || {
        let mut conn = connect(&database_url)?;
        let pending = conn
            .pending_migrations(MIGRATIONS)
            .map_err(|e| migration_error("check pending migrations", e))?;
        Ok(pending.iter().map(|m| m.name().to_string()).collect())
    })
    .await
}

/// Applies every pending migration and returns the applied versions
pub async fn run_pending_migrations(database_url: &str) -> Result<Vec<String>, StorageError> {
    let database_url = database_url.to_string();
    blocking(move || {
        let mut conn = connect(&database_url)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| migration_error("run pending migrations", e))?;
        Ok(applied.iter().map(|m| m.to_string()).collect())
    })
    .await
}

/// Reverts the last `steps` migrations and returns the reverted versions
pub async fn revert_migrations(
    database_url: &str,
    steps: u32,
) -> Result<Vec<String>, StorageError> {
    let database_url = database_url.to_string();
    blocking(move || {
        let mut conn = connect(&database_url)?;
        let mut reverted = Vec::new();
        for _ in 0..steps {
            match conn.revert_last_migration(MIGRATIONS) {
                Ok(version) => reverted.push(version.to_string()),
                Err(e) if reverted.is_empty() => {
                    return Err(migration_error("revert migration", e));
                }
                // Nothing left to revert
                Err(_) => break,
            }
        }
        Ok(reverted)
    })
    .await
}

//! Async database connection pool implementation.
//!
//! Uses bb8 connection pool manager with diesel_async for PostgreSQL connections.

use std::time::Duration;

use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::pooled_connection::bb8::Pool;

use crate::config::DatabaseConfig;
use crate::error::StorageError;

/// Async connection pool type alias.
///
/// bb8::Pool internally uses Arc, so Clone is cheap.
pub type AsyncDbPool = Pool<AsyncPgConnection>;

/// Creates the connection pool and checks out one connection to prove the
/// database is reachable.
///
/// # Errors
///
/// `StorageError::Connection` if the pool cannot be built or the first
/// connection cannot be established within `connection_timeout`.
///
/// # Example
///
/// ```ignore
/// let pool = establish_async_connection_pool(&settings.database).await?;
/// let mut conn = pool.get().await?;
/// ```
pub async fn establish_async_connection_pool(
    config: &DatabaseConfig,
) -> Result<AsyncDbPool, StorageError> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.url.as_str());
    let pool = Pool::builder()
        .max_size(config.max_connections)
        .min_idle(Some(config.min_connections))
        .connection_timeout(Duration::from_secs(config.connection_timeout))
        .build(manager)
        .await
        .map_err(StorageError::connection)?;

    // bb8 builds lazily; fail startup here rather than on the first poll
    drop(pool.get().await.map_err(StorageError::connection)?);

    Ok(pool)
}

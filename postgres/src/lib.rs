//! `PostgreSQL` persistence gateway for Walkup.
//!
//! Stores each queue collection as one JSONB row keyed by its storage key:
//!
//! ```sql
//! CREATE TABLE walkup_store (
//!     key TEXT PRIMARY KEY,
//!     value JSONB NOT NULL,
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
//! );
//! ```
//!
//! A batch is upserted inside one transaction, so ticket generation and
//! call-next never leave the counters and ticket lists out of step.
//!
//! # Example
//!
//! ```ignore
//! use walkup_postgres::PostgresGateway;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let gateway = PostgresGateway::new("postgres://localhost/walkup", 5).await?;
//!     gateway.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use walkup_core::persistence::{
    GatewayFuture, PersistenceError, PersistenceGateway, StorageKey, StoredValue,
};

/// PostgreSQL-backed persistence gateway.
#[derive(Clone)]
pub struct PostgresGateway {
    pool: PgPool,
}

impl PostgresGateway {
    /// Connect to `database_url` with a pool of at most `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Backend`] if the connection fails.
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, PersistenceError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| PersistenceError::Backend(format!("Failed to connect: {e}")))?;

        Ok(Self::from_pool(pool))
    }

    /// Gateway over an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `walkup_store` table if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`PersistenceError::Backend`] if migration fails.
    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PersistenceError::Backend(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_value(&self, key: StorageKey) -> Result<Option<Value>, PersistenceError> {
        let row: Option<(Value,)> = sqlx::query_as("SELECT value FROM walkup_store WHERE key = $1")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PersistenceError::Backend(format!("Failed to load {key}: {e}")))?;

        Ok(row.map(|(value,)| value))
    }

    async fn save_batch(&self, batch: Vec<StoredValue>) -> Result<(), PersistenceError> {
        let failed = |e: sqlx::Error| PersistenceError::Backend(format!("Failed to save: {e}"));

        let mut tx = self.pool.begin().await.map_err(failed)?;
        for StoredValue { key, value } in batch {
            sqlx::query(
                "INSERT INTO walkup_store (key, value, updated_at)
                 VALUES ($1, $2, now())
                 ON CONFLICT (key) DO UPDATE
                 SET value = EXCLUDED.value, updated_at = now()",
            )
            .bind(key.as_str())
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        }
        tx.commit().await.map_err(failed)?;
        Ok(())
    }

    async fn clear_all(&self) -> Result<(), PersistenceError> {
        let result = sqlx::query("DELETE FROM walkup_store")
            .execute(&self.pool)
            .await
            .map_err(|e| PersistenceError::Backend(format!("Failed to clear: {e}")))?;

        tracing::debug!(rows = result.rows_affected(), "Cleared walkup_store");
        Ok(())
    }
}

impl PersistenceGateway for PostgresGateway {
    fn load(&self, key: StorageKey) -> GatewayFuture<'_, Option<Value>> {
        Box::pin(self.load_value(key))
    }

    fn save(&self, batch: Vec<StoredValue>) -> GatewayFuture<'_, ()> {
        Box::pin(self.save_batch(batch))
    }

    fn clear(&self) -> GatewayFuture<'_, ()> {
        Box::pin(self.clear_all())
    }
}

//! Shared Postgres connection pool, sized the way the source's production
//! deployment was tuned.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::{PersistenceError, Result};

#[derive(Debug, Clone)]
pub struct PostgresGateway {
    pub(crate) pool: PgPool,
}

impl PostgresGateway {
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(100)
            .min_connections(20)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .max_lifetime(Duration::from_secs(1800))
            .connect(database_url)
            .await
            .map_err(|e| PersistenceError::PoolCreation(e.to_string()))?;

        info!(max_connections = 100, min_connections = 20, "postgres pool initialized");
        Ok(Self { pool })
    }

    pub fn pool_metrics(&self) -> (u32, usize) {
        (self.pool.size(), self.pool.num_idle())
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

//! PostgreSQL connection pool

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;

use crate::store::StoreResult;

/// Connect a pool and verify it with a round trip
pub async fn connect(url: &str, max_connections: u32) -> StoreResult<PgPool> {
    info!("Connecting to PostgreSQL (max {} connections)", max_connections);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(3))
        .connect(url)
        .await?;

    sqlx::query("SELECT 1").execute(&pool).await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

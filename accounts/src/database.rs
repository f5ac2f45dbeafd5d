use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

/// Initialize a PostgreSQL connection pool
pub async fn create_pool(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections())
        .connect(config.database_url())
        .await?;

    tracing::info!(
        database = %config.database_name(),
        max_connections = config.max_connections(),
        "Database connection pool established"
    );

    Ok(pool)
}

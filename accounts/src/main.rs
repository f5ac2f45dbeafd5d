use account_store::{
    AccountStore, DocumentStore, PgDocumentStore, config::Config, database, telemetry,
};
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Provisions the account collections and indexes, then exits.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config: Config = Config::init()?;

    // Initialize tracing
    telemetry::init_tracing(&config)?;
    info!(
        environment = %config.environment(),
        database = %config.database_name(),
        "Configuration loaded"
    );

    // Initialize database connection pool
    let pool = database::create_pool(&config).await?;
    let store = PgDocumentStore::new(pool, config.database_name())?;

    let accounts = AccountStore::new(store);
    accounts.ensure_indexes().await?;

    if !accounts.store().is_connected().await {
        anyhow::bail!("database {} is not reachable", config.database_name());
    }

    info!(database = %accounts.store().database(), "Account store ready");
    Ok(())
}

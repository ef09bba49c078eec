use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Connect to the settings store and bring its schema up to date.
///
/// `max_connections` should come from `AppConfig::db_max_connections`. Every
/// broadcast issues one context lookup per candidate channel concurrently, so
/// the pool size bounds how many of those are actually in flight.
pub async fn connect_settings_store(
    database_url: &str,
    max_connections: u32,
) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await?;
    tracing::info!(max_connections, "Connected to settings store");

    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Settings store migrations applied");

    Ok(pool)
}

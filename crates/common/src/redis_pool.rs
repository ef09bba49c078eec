use redis::Client;
use redis::aio::ConnectionManager;

/// Connect to the Redis instance holding the worker cache and the broadcast queue.
///
/// Issues a `PING` up front so a bad `REDIS_URL` fails at startup rather than on
/// the first broadcast.
pub async fn connect_worker_cache(redis_url: &str) -> anyhow::Result<ConnectionManager> {
    let client = Client::open(redis_url)?;
    let mut manager = ConnectionManager::new(client).await?;

    let pong: String = redis::cmd("PING").query_async(&mut manager).await?;
    tracing::info!(reply = %pong, "Connected to worker cache");

    Ok(manager)
}

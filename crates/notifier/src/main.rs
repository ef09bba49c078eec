use std::sync::Arc;
use std::time::Duration;

use relay_common::config::AppConfig;
use relay_common::db;
use relay_common::redis_pool;
use relay_notifier::broadcaster::Broadcaster;
use relay_notifier::cache::RedisWorkerCache;
use relay_notifier::delivery::DiscordWebhookSender;
use relay_notifier::store::PgSettingsStore;
use relay_notifier::worker::{BroadcastWorker, RedisJobQueue};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relay_notifier=info,relay_common=info".into()),
        )
        .json()
        .init();

    tracing::info!("World-State Relay notifier starting...");

    let config = AppConfig::from_env()?;
    tracing::info!(
        shard_id = ?config.shard.shard_id,
        total_shards = config.shard.total_shards,
        cached_events = config.cached_events.len(),
        "Configuration loaded"
    );

    let pool = db::connect_settings_store(&config.database_url, config.db_max_connections).await?;
    let cache_conn = redis_pool::connect_worker_cache(&config.redis_url).await?;
    let queue_conn = redis_pool::connect_worker_cache(&config.redis_url).await?;

    let sender = DiscordWebhookSender::new(Duration::from_millis(config.webhook_timeout_ms))?;
    let broadcaster = Broadcaster::new(
        Arc::new(PgSettingsStore::new(pool)),
        Arc::new(RedisWorkerCache::new(cache_conn)),
        Arc::new(sender),
        config.shard,
        config.cached_events.clone(),
    );

    tracing::info!(queue = %config.broadcast_queue, "Consuming broadcast queue");
    let queue = RedisJobQueue::new(config.broadcast_queue.clone(), queue_conn);
    let mut worker = BroadcastWorker::new(broadcaster, queue);

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        _ = worker.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("World-State Relay notifier stopped.");
    Ok(())
}

//! Worker cache — read-only view of data an external refresher keeps in Redis.
//!
//! Keys read by the broadcaster:
//! - `guilds`: `{ guildId: { id, channels: [channelId, ...] } }`
//! - `<type>:<platform>:<locale>`: `[{ channelId, threadId }, ...]`
//! - `pings`: `{ "<guildId>:<type>,<items...>": "<mention text>" }`
//!
//! All values are JSON strings. This is not a loading cache: a missing key is
//! reported as `None` and never populated from here.

use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;

use relay_common::error::AppError;
use relay_common::types::GuildRegistration;

pub const GUILDS_KEY: &str = "guilds";
pub const PINGS_KEY: &str = "pings";

#[async_trait]
pub trait WorkerCache: Send + Sync {
    /// Raw JSON value stored at `key`, if any.
    async fn get_key(&self, key: &str) -> Result<Option<serde_json::Value>, AppError>;
}

/// Fetch and decode a typed value, treating a missing key as `None`.
pub async fn get_typed<T: DeserializeOwned>(
    cache: &dyn WorkerCache,
    key: &str,
) -> Result<Option<T>, AppError> {
    match cache.get_key(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Snapshot of the guild → channels mapping, in the order the refresher wrote
/// it. Missing key yields an empty list.
///
/// Relies on serde_json's `preserve_order`: a channel listed under several
/// guilds is attributed to the first one, so the order has to survive decoding.
pub async fn guild_snapshot(cache: &dyn WorkerCache) -> Result<Vec<GuildRegistration>, AppError> {
    let Some(value) = cache.get_key(GUILDS_KEY).await? else {
        return Ok(Vec::new());
    };
    let entries: serde_json::Map<String, serde_json::Value> = serde_json::from_value(value)?;

    entries
        .into_iter()
        .map(|(guild_id, raw)| -> Result<GuildRegistration, AppError> {
            let mut guild: GuildRegistration = serde_json::from_value(raw)?;
            // Older refreshers only wrote the map key.
            if guild.id.is_empty() {
                guild.id = guild_id;
            }
            Ok(guild)
        })
        .collect()
}

/// Snapshot of the ping table. Missing key yields an empty table.
pub async fn ping_snapshot(cache: &dyn WorkerCache) -> Result<HashMap<String, String>, AppError> {
    let pings: Option<HashMap<String, String>> = get_typed(cache, PINGS_KEY).await?;
    Ok(pings.unwrap_or_default())
}

/// Redis-backed worker cache.
#[derive(Clone)]
pub struct RedisWorkerCache {
    redis: ConnectionManager,
}

impl RedisWorkerCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl WorkerCache for RedisWorkerCache {
    async fn get_key(&self, key: &str) -> Result<Option<serde_json::Value>, AppError> {
        // ConnectionManager is a cheap handle over one multiplexed connection.
        let mut redis = self.redis.clone();
        let raw: Option<String> = redis.get(key).await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}

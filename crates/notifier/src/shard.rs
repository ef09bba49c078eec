//! Shard partitioner — decides which guilds this process is responsible for.
//!
//! Guild ids are snowflakes: the high bits above bit 22 encode the creation
//! timestamp, so `(id >> 22) % total_shards` spreads guilds evenly. Every shard
//! in a deployment must use the same formula or guilds get dropped or doubled.

use relay_common::config::ShardConfig;
use relay_common::types::GuildRegistration;

/// Width of the snowflake's low-order worker/process/increment fields.
const SNOWFLAKE_SHARD_SHIFT: u32 = 22;

/// Shard index a guild id maps to, or `None` when there are no shards to map
/// onto. Non-numeric ids are treated as 0.
pub fn shard_of(guild_id: &str, total_shards: u64) -> Option<u64> {
    let id: u64 = guild_id.trim().parse().unwrap_or(0);
    (id >> SNOWFLAKE_SHARD_SHIFT).checked_rem(total_shards)
}

/// Pure ownership check over a fixed shard identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShardPartitioner {
    config: ShardConfig,
}

impl ShardPartitioner {
    pub fn new(config: ShardConfig) -> Self {
        Self { config }
    }

    /// Whether partitioning is active at all.
    pub fn is_partitioned(&self) -> bool {
        self.config.shard_id.is_some() && self.config.total_shards > 0
    }

    pub fn owns_guild(&self, guild_id: &str) -> bool {
        match (self.config.shard_id, shard_of(guild_id, self.config.total_shards)) {
            (Some(shard_id), Some(shard)) => shard == shard_id,
            _ => true,
        }
    }

    /// Narrow a guild list down to this shard's slice, keeping its order.
    pub fn partition(&self, guilds: Vec<GuildRegistration>) -> Vec<GuildRegistration> {
        if !self.is_partitioned() {
            return guilds;
        }
        guilds
            .into_iter()
            .filter(|guild| self.owns_guild(&guild.id))
            .collect()
    }
}
